//! Rendering of the sampler history and the best-fit overlay.
//!
//! All numeric artifacts are persisted before any of these run, so a
//! rendering failure cannot take the fit results down with it.

use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tofcal_common::{Interval, TimeNs};
use tofcal_fitting::histogram::TimeHistogram;
use tofcal_fitting::likelihood::{MixtureDensity, ParameterVector};
use tofcal_fitting::sampler::SampleChain;
use tofcal_fitting::summary::percentile;

const QUANTILES: [f64; 3] = [16.0, 50.0, 84.0];

type SvgArea<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// One panel per parameter, every walker's path drawn faintly over the
/// production steps.
pub(crate) fn plot_traces(
    chain: &SampleChain,
    labels: &[&str],
    path: &Path,
) -> Result<()> {
    let ndim = chain.ndim();
    let root = SVGBackend::new(path, (1000, 220 * ndim as u32)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((ndim, 1));

    for (parameter, panel) in panels.iter().enumerate() {
        let series = chain.walker_series(parameter);
        let (mut low, mut high) = (f64::INFINITY, f64::NEG_INFINITY);
        for walker in &series {
            for &value in walker {
                low = low.min(value);
                high = high.max(value);
            }
        }
        if !(high > low) {
            high = low + 1.0;
        }

        let mut chart = ChartBuilder::on(panel)
            .margin(10)
            .x_label_area_size(25)
            .y_label_area_size(60)
            .caption(labels[parameter], ("sans-serif", 18))
            .build_cartesian_2d(0f64..chain.n_steps() as f64, low..high)?;
        chart.configure_mesh().disable_x_mesh().disable_y_mesh().draw()?;

        for walker in &series {
            chart.draw_series(LineSeries::new(
                walker
                    .iter()
                    .enumerate()
                    .map(|(step, &value)| (step as f64, value)),
                &BLACK.mix(0.3),
            ))?;
        }
    }
    root.present()?;
    Ok(())
}

/// Pairwise posterior plot: marginal histograms with quantile markers on
/// the diagonal, scatter panels below it.
pub(crate) fn plot_corner(
    chain: &SampleChain,
    labels: &[&str],
    bounds: &[Interval<f64>],
    path: &Path,
) -> Result<()> {
    let ndim = chain.ndim();
    let root = SVGBackend::new(path, (300 * ndim as u32, 300 * ndim as u32)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((ndim, ndim));

    for row in 0..ndim {
        for col in 0..=row {
            let panel = &panels[row * ndim + col];
            if row == col {
                draw_marginal(panel, chain, labels, bounds, col)?;
            } else {
                draw_scatter(panel, chain, labels, bounds, col, row)?;
            }
        }
    }
    root.present()?;
    Ok(())
}

fn draw_marginal(
    panel: &SvgArea<'_>,
    chain: &SampleChain,
    labels: &[&str],
    bounds: &[Interval<f64>],
    parameter: usize,
) -> Result<()> {
    let samples = chain.parameter_samples(parameter);
    let window = bounds[parameter];
    let mut histogram = TimeHistogram::new(window, 40)?;
    for &value in &samples {
        histogram.fill(value);
    }
    let peak = histogram
        .counts()
        .iter()
        .fold(0f64, |a, &b| a.max(b))
        .max(1.0);

    let mut chart = ChartBuilder::on(panel)
        .margin(8)
        .x_label_area_size(25)
        .y_label_area_size(35)
        .caption(labels[parameter], ("sans-serif", 14))
        .build_cartesian_2d(window.min..window.max, 0f64..peak * 1.1)?;
    chart.configure_mesh().disable_x_mesh().disable_y_mesh().draw()?;

    chart.draw_series((0..histogram.n_bins()).map(|bin| {
        let (left, right) = histogram.bin_edges(bin);
        Rectangle::new(
            [(left, 0.0), (right, histogram.counts()[bin])],
            BLUE.mix(0.4).filled(),
        )
    }))?;

    for quantile in QUANTILES {
        if let Ok(value) = percentile(&samples, quantile) {
            chart.draw_series(LineSeries::new(
                [(value, 0.0), (value, peak * 1.1)],
                &BLACK,
            ))?;
        }
    }
    Ok(())
}

fn draw_scatter(
    panel: &SvgArea<'_>,
    chain: &SampleChain,
    labels: &[&str],
    bounds: &[Interval<f64>],
    x_parameter: usize,
    y_parameter: usize,
) -> Result<()> {
    let x_samples = chain.parameter_samples(x_parameter);
    let y_samples = chain.parameter_samples(y_parameter);
    let x_window = bounds[x_parameter];
    let y_window = bounds[y_parameter];

    let mut chart = ChartBuilder::on(panel)
        .margin(8)
        .x_label_area_size(25)
        .y_label_area_size(35)
        .caption(
            format!("{} vs {}", labels[y_parameter], labels[x_parameter]),
            ("sans-serif", 14),
        )
        .build_cartesian_2d(x_window.min..x_window.max, y_window.min..y_window.max)?;
    chart.configure_mesh().disable_x_mesh().disable_y_mesh().draw()?;

    chart.draw_series(
        x_samples
            .iter()
            .zip(&y_samples)
            .map(|(&x, &y)| Circle::new((x, y), 1, BLUE.mix(0.15).filled())),
    )?;
    Ok(())
}

/// Bins the data and the mixture expectation over the analysis window.
/// Shared by the overlay image and its tabular dump.
pub(crate) struct OverlayTable {
    pub(crate) centers: Vec<TimeNs>,
    pub(crate) data_counts: Vec<f64>,
    pub(crate) model_counts: Vec<f64>,
}

impl OverlayTable {
    pub(crate) fn new(
        data_times: &[TimeNs],
        mixture: &MixtureDensity,
    ) -> Result<Self> {
        let signal = mixture.signal();
        let mut data_histogram = TimeHistogram::new(signal.window(), signal.n_bins())?;
        for &time in data_times {
            data_histogram.fill(time);
        }
        let n_data = data_histogram.total();
        let bin_width = data_histogram.bin_width();

        let mut centers = Vec::with_capacity(signal.n_bins());
        let mut model_counts = Vec::with_capacity(signal.n_bins());
        for bin in 0..signal.n_bins() {
            let center = signal.bin_center(bin);
            centers.push(center);
            model_counts.push(mixture.density_at(center) * bin_width * n_data);
        }
        Ok(Self {
            centers,
            data_counts: data_histogram.counts().to_vec(),
            model_counts,
        })
    }

    /// The structured results container: data and model histograms side
    /// by side, one row per bin.
    pub(crate) fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "time_ns,data_counts,model_counts")?;
        for ((center, data), model) in self
            .centers
            .iter()
            .zip(&self.data_counts)
            .zip(&self.model_counts)
        {
            writeln!(writer, "{center},{data},{model}")?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Data histogram as points with the best-fit mixture curve over it.
pub(crate) fn plot_best_fit(
    table: &OverlayTable,
    theta: &ParameterVector,
    window: Interval<TimeNs>,
    path: &Path,
) -> Result<()> {
    let peak = table
        .data_counts
        .iter()
        .chain(&table.model_counts)
        .fold(0f64, |a, &b| a.max(b))
        .max(1.0);

    let root = SVGBackend::new(path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .caption(
            format!(
                "shift={:.3}, smear={:.3}",
                theta.time_shift, theta.smear_width
            ),
            ("sans-serif", 20),
        )
        .build_cartesian_2d(window.min..window.max, 0f64..peak * 1.15)?;
    chart
        .configure_mesh()
        .x_desc("time (ns)")
        .y_desc("counts")
        .draw()?;

    chart
        .draw_series(
            table
                .centers
                .iter()
                .zip(&table.data_counts)
                .map(|(&center, &count)| Circle::new((center, count), 2, BLACK.filled())),
        )?
        .label("Data")
        .legend(|(x, y)| Circle::new((x, y), 2, BLACK.filled()));

    chart
        .draw_series(LineSeries::new(
            table
                .centers
                .iter()
                .zip(&table.model_counts)
                .map(|(&center, &count)| (center, count)),
            &RED,
        ))?
        .label("Model")
        .legend(|(x, y)| PathElement::new(vec![(x - 10, y), (x + 10, y)], RED));

    chart
        .configure_series_labels()
        .background_style(WHITE)
        .draw()?;
    root.present()?;
    Ok(())
}
