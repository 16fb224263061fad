//! Liskien & Paulsen 7Li(p,n) tables and their interpolation.
//!
//! 0-degree neutron energies and production cross-sections versus
//! incident proton energy, from Liskien & Paulsen,
//! Atomic Data and Nuclear Data Tables 15 (1975) 57.
//! Near the production threshold the Lee & Zhou data should be used
//! instead; these tables start at 1950 keV.

/// Proton energies (keV).
const E_P: [f64; 55] = [
    1950.0, 2000.0, 2050.0, 2150.0, 2200.0, 2250.0, 2300.0, 2350.0, 2400.0, 2450.0, 2500.0,
    2600.0, 2700.0, 2800.0, 2900.0, 3000.0, 3100.0, 3200.0, 3300.0, 3400.0, 3500.0, 3600.0,
    3700.0, 3800.0, 3900.0, 4000.0, 4100.0, 4200.0, 4300.0, 4400.0, 4500.0, 4600.0, 4700.0,
    4800.0, 4900.0, 5000.0, 5100.0, 5200.0, 5300.0, 5400.0, 5500.0, 5600.0, 5700.0, 5800.0,
    5900.0, 6000.0, 6100.0, 6200.0, 6300.0, 6400.0, 6500.0, 6600.0, 6700.0, 6800.0, 6900.0,
];

/// 0-degree neutron energies (keV) for the proton energies above.
const E_N: [f64; 55] = [
    165.0, 230.0, 291.0, 350.0, 407.0, 463.0, 518.0, 573.0, 627.0, 680.0, 733.0, 891.0, 996.0,
    1099.0, 1203.0, 1304.0, 1408.0, 1511.0, 1613.0, 1715.0, 1816.0, 1918.0, 2019.0, 2121.0,
    2222.0, 2323.0, 2424.0, 2525.0, 2626.0, 2727.0, 2828.0, 2929.0, 3030.0, 3130.0, 3231.0,
    3332.0, 3432.0, 3533.0, 3633.0, 3734.0, 3835.0, 3935.0, 4035.0, 4136.0, 4236.0, 4336.0,
    4437.0, 4538.0, 4638.0, 4738.0, 4838.0, 4939.0, 5039.0, 5139.0, 5239.0,
];

/// 0-degree neutron cross-sections (mb/sr) for the proton energies above.
const XS_N: [f64; 55] = [
    58.8, 37.8, 27.2, 44.6, 88.5, 145.0, 149.0, 124.0, 104.0, 89.3, 78.7, 65.6, 57.2, 53.5,
    50.9, 48.8, 47.1, 45.7, 44.4, 43.2, 42.1, 41.1, 40.3, 39.6, 38.8, 38.3, 38.7, 40.1, 42.6,
    45.6, 48.9, 52.8, 27.8, 62.8, 67.3, 39.9, 67.8, 63.5, 58.9, 55.5, 50.7, 46.9, 43.7, 40.0,
    36.8, 33.6, 31.1, 28.8, 26.8, 24.9, 23.1, 21.3, 19.9, 18.7, 17.6,
];

/// Piecewise-linear interpolation over sorted knots, clamped at the
/// table ends.
pub(crate) struct LinearTable {
    knots: Vec<f64>,
    values: Vec<f64>,
}

impl LinearTable {
    fn new(knots: &[f64], values: &[f64]) -> Self {
        Self {
            knots: knots.to_vec(),
            values: values.to_vec(),
        }
    }

    pub(crate) fn eval(&self, x: f64) -> f64 {
        let last = self.knots.len() - 1;
        if x <= self.knots[0] {
            return self.values[0];
        }
        if x >= self.knots[last] {
            return self.values[last];
        }
        let upper = self.knots.partition_point(|&knot| knot < x).clamp(1, last);
        let lower = upper - 1;
        let t = (x - self.knots[lower]) / (self.knots[upper] - self.knots[lower]);
        self.values[lower] * (1.0 - t) + self.values[upper] * t
    }
}

/// Proton energy (keV) to 0-degree neutron energy (keV).
pub(crate) fn neutron_energy_table() -> LinearTable {
    LinearTable::new(&E_P, &E_N)
}

/// Proton energy (keV) to relative cross-section weight. Only relative
/// cross-sections matter, so the table is scaled to the first entry.
pub(crate) fn relative_cross_section_table() -> LinearTable {
    let relative: Vec<f64> = XS_N.iter().map(|xs| xs / XS_N[0]).collect();
    LinearTable::new(&E_P, &relative)
}
