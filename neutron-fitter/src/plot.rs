//! Rendering of the TOF fit overlay and the best-fit neutron spectrum.

use anyhow::Result;
use plotters::prelude::*;
use std::path::Path;
use tofcal_common::{Interval, TimeNs};
use tofcal_fitting::histogram::{BinnedDensity, TimeHistogram};

/// Data histogram plus the fitted model and its two components, binned
/// over the fit window.
pub(crate) struct TofOverlay {
    pub(crate) centers: Vec<TimeNs>,
    pub(crate) data_counts: Vec<f64>,
    pub(crate) model_counts: Vec<f64>,
    pub(crate) neutron_counts: Vec<f64>,
    pub(crate) background_counts: Vec<f64>,
}

impl TofOverlay {
    pub(crate) fn new(
        data_times: &[TimeNs],
        signal: &BinnedDensity,
        fraction: f64,
    ) -> Result<Self> {
        let mut data_histogram = TimeHistogram::new(signal.window(), signal.n_bins())?;
        for &time in data_times {
            data_histogram.fill(time);
        }
        let n_data = data_histogram.total();
        let background_per_bin = (1.0 - fraction) * n_data / signal.n_bins() as f64;

        let mut centers = Vec::with_capacity(signal.n_bins());
        let mut model_counts = Vec::with_capacity(signal.n_bins());
        let mut neutron_counts = Vec::with_capacity(signal.n_bins());
        let mut background_counts = Vec::with_capacity(signal.n_bins());
        for bin in 0..signal.n_bins() {
            centers.push(signal.bin_center(bin));
            let neutrons = fraction * signal.bin_mass(bin) * n_data;
            neutron_counts.push(neutrons);
            background_counts.push(background_per_bin);
            model_counts.push(neutrons + background_per_bin);
        }
        Ok(Self {
            centers,
            data_counts: data_histogram.counts().to_vec(),
            model_counts,
            neutron_counts,
            background_counts,
        })
    }

    pub(crate) fn render(
        &self,
        window: Interval<TimeNs>,
        caption: &str,
        path: &Path,
    ) -> Result<()> {
        let peak = self
            .data_counts
            .iter()
            .chain(&self.model_counts)
            .fold(0f64, |a, &b| a.max(b))
            .max(1.0);

        let root = SVGBackend::new(path, (900, 600)).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(50)
            .caption(caption, ("sans-serif", 20))
            .build_cartesian_2d(window.min..window.max, 0f64..peak * 1.15)?;
        chart
            .configure_mesh()
            .x_desc("time (ns)")
            .y_desc("counts")
            .draw()?;

        chart
            .draw_series(
                self.centers
                    .iter()
                    .zip(&self.data_counts)
                    .map(|(&center, &count)| Circle::new((center, count), 2, BLACK.filled())),
            )?
            .label("Data")
            .legend(|(x, y)| Circle::new((x, y), 2, BLACK.filled()));

        for (series, color, label) in [
            (&self.model_counts, RED, "Model"),
            (&self.neutron_counts, BLUE, "Neutrons"),
            (&self.background_counts, RGBColor(128, 128, 128), "Background"),
        ] {
            chart
                .draw_series(LineSeries::new(
                    self.centers
                        .iter()
                        .zip(series)
                        .map(|(&center, &count)| (center, count)),
                    &color,
                ))?
                .label(label)
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x - 10, y), (x + 10, y)], color)
                });
        }

        chart
            .configure_series_labels()
            .background_style(WHITE)
            .draw()?;
        root.present()?;
        Ok(())
    }
}

/// Best-fit neutron energy spectrum as a single line series.
pub(crate) fn plot_spectrum(
    spectrum: &BinnedDensity,
    caption: &str,
    path: &Path,
) -> Result<()> {
    let peak = spectrum
        .masses()
        .iter()
        .fold(0f64, |a, &b| a.max(b))
        .max(1e-12);
    let window = spectrum.window();

    let root = SVGBackend::new(path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .caption(caption, ("sans-serif", 20))
        .build_cartesian_2d(window.min..window.max, 0f64..peak * 1.15)?;
    chart
        .configure_mesh()
        .x_desc("neutron energy (keV)")
        .y_desc("probability per bin")
        .draw()?;

    chart.draw_series(LineSeries::new(
        (0..spectrum.n_bins()).map(|bin| (spectrum.bin_center(bin), spectrum.bin_mass(bin))),
        &BLUE,
    ))?;
    root.present()?;
    Ok(())
}
