//! Visualization utilities for rust_nmpc
//!
//! Layers are collected first and drawn onto a single gnuplot axes when
//! the figure is shown or saved.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::{MpcError, MpcResult, Point2D, Pose2D};
use crate::path_tracking::SimulationResult;

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const GREEN: &str = "#00FF00";
    pub const BLUE: &str = "#0000FF";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const REFERENCE: &str = GRAY;
    pub const TRAJECTORY: &str = BLUE;
    pub const PREDICTION: &str = GREEN;
    pub const START: &str = BLACK;
    pub const FALLBACK: &str = RED;
}

/// Style for path rendering
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::new(colors::TRAJECTORY, "Path")
    }
}

/// Style for point rendering
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub symbol: char,
    pub caption: String,
}

impl PointStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 1.0,
            symbol: 'O',
            caption: caption.to_string(),
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = symbol;
        self
    }
}

#[derive(Debug, Clone)]
enum Layer {
    Lines { x: Vec<f64>, y: Vec<f64>, style: PathStyle },
    Points { x: Vec<f64>, y: Vec<f64>, style: PointStyle },
}

pub struct Visualizer {
    layers: Vec<Layer>,
    title: String,
    x_label: String,
    y_label: String,
    aspect_ratio: Option<f64>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            title: String::new(),
            x_label: "X [m]".to_string(),
            y_label: "Y [m]".to_string(),
            aspect_ratio: Some(1.0),
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> &mut Self {
        self.aspect_ratio = ratio;
        self
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn plot_path(&mut self, points: &[Point2D], style: &PathStyle) -> &mut Self {
        let (x, y) = split_xy(points.iter().copied());
        self.layers.push(Layer::Lines { x, y, style: style.clone() });
        self
    }

    pub fn plot_poses(&mut self, poses: &[Pose2D], style: &PathStyle) -> &mut Self {
        let (x, y) = split_xy(poses.iter().map(|p| p.position()));
        self.layers.push(Layer::Lines { x, y, style: style.clone() });
        self
    }

    pub fn plot_points(&mut self, points: &[Point2D], style: &PointStyle) -> &mut Self {
        let (x, y) = split_xy(points.iter().copied());
        self.layers.push(Layer::Points { x, y, style: style.clone() });
        self
    }

    /// Reference waypoints, driven trajectory, start, last prediction and
    /// the ticks where a failed solve was replaced by braking
    pub fn plot_simulation(&mut self, waypoints: &[Point2D], result: &SimulationResult) -> &mut Self {
        self.plot_path(waypoints, &PathStyle::new(colors::REFERENCE, "Reference").with_line_width(1.0));
        self.plot_poses(&result.trajectory, &PathStyle::new(colors::TRAJECTORY, "Trajectory"));
        if !result.last_prediction.is_empty() {
            self.plot_points(
                &result.last_prediction,
                &PointStyle::new(colors::PREDICTION, "Prediction").with_size(0.8),
            );
        }
        if let Some(start) = result.trajectory.first() {
            self.plot_points(
                &[start.position()],
                &PointStyle::new(colors::START, "Start").with_size(1.5).with_symbol('S'),
            );
        }
        if !result.fallback_positions.is_empty() {
            self.plot_points(
                &result.fallback_positions,
                &PointStyle::new(colors::FALLBACK, "Fallback").with_symbol('x'),
            );
        }
        self
    }

    pub fn show(&mut self) -> MpcResult<()> {
        let mut figure = self.render();
        figure.show().map(|_| ()).map_err(|e| MpcError::Plot(e.to_string()))
    }

    pub fn save_svg(&mut self, path: &str, width: u32, height: u32) -> MpcResult<()> {
        let mut figure = self.render();
        figure
            .save_to_svg(path, width, height)
            .map_err(|e| MpcError::Plot(e.to_string()))
    }

    fn render(&self) -> Figure {
        let mut figure = Figure::new();
        let axes = figure.axes2d();

        for layer in &self.layers {
            match layer {
                Layer::Lines { x, y, style } => {
                    axes.lines(x, y, &[
                        Caption(&style.caption),
                        Color(&style.color),
                        LineWidth(style.line_width),
                    ]);
                }
                Layer::Points { x, y, style } => {
                    axes.points(x, y, &[
                        Caption(&style.caption),
                        Color(&style.color),
                        PointSymbol(style.symbol),
                        PointSize(style.size),
                    ]);
                }
            }
        }

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label(&self.x_label, &[]);
        axes.set_y_label(&self.y_label, &[]);
        if let Some(ratio) = self.aspect_ratio {
            axes.set_aspect_ratio(AutoOption::Fix(ratio));
        }
        figure
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

fn split_xy(points: impl Iterator<Item = Point2D>) -> (Vec<f64>, Vec<f64>) {
    points.map(|p| (p.x, p.y)).unzip()
}
