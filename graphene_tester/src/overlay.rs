use graphene::core_modules::overlay::{BOX_THICKNESS, LABEL_COLOR, OBJECT_COLOR, SUBJECT_COLOR};
use graphene::{BoundingBox, FrameRef, RenderAdapter, RenderError, TripleSet, layout};
use opencv::{
    core::{self, Mat, Point, Rect, Scalar},
    highgui, imgcodecs, imgproc,
    prelude::*,
};
use std::path::PathBuf;

const WINDOW: &str = "graphene";

/// Draws the accepted scene over the captured frame with OpenCV.
pub struct OpencvOverlayRenderer {
    output: Option<PathBuf>,
    preview: bool,
}

impl OpencvOverlayRenderer {
    pub fn new(output: Option<PathBuf>, preview: bool) -> Self {
        Self { output, preview }
    }

    fn draw(&self, scene: &TripleSet, frame: &FrameRef) -> opencv::Result<()> {
        let source = frame.path.to_string_lossy();
        let mut canvas = imgcodecs::imread(&source, imgcodecs::IMREAD_COLOR)?;
        if canvas.empty() {
            return Err(opencv::Error::new(core::StsError, format!("cannot read frame {source}")));
        }

        for item in layout(scene) {
            draw_box(&mut canvas, &item.subject_box, SUBJECT_COLOR)?;
            draw_box(&mut canvas, &item.object_box, OBJECT_COLOR)?;
            draw_label(&mut canvas, &item.key.subject, item.subject_anchor)?;
            draw_label(&mut canvas, &item.key.object, item.object_anchor)?;
            draw_label(&mut canvas, &item.key.predicate, item.predicate_anchor)?;
        }

        if let Some(output) = &self.output {
            imgcodecs::imwrite(&output.to_string_lossy(), &canvas, &core::Vector::new())?;
        }
        if self.preview {
            highgui::imshow(WINDOW, &canvas)?;
            // Pumps the window's event loop without waiting for a key.
            highgui::wait_key(1)?;
        }
        Ok(())
    }
}

impl RenderAdapter for OpencvOverlayRenderer {
    async fn render(&mut self, scene: &TripleSet, frame: &FrameRef) -> Result<(), RenderError> {
        tokio::task::block_in_place(|| self.draw(scene, frame)).map_err(|e| RenderError::Backend(e.to_string()))
    }
}

/// OpenCV wants BGR.
fn bgr([r, g, b]: [u8; 3]) -> Scalar {
    Scalar::new(b as f64, g as f64, r as f64, 0.0)
}

fn draw_box(canvas: &mut Mat, bounds: &BoundingBox, color: [u8; 3]) -> opencv::Result<()> {
    let rect = Rect::new(
        bounds.xmin.round() as i32,
        bounds.ymin.round() as i32,
        bounds.width().round() as i32,
        bounds.height().round() as i32,
    );
    imgproc::rectangle(canvas, rect, bgr(color), BOX_THICKNESS.ceil() as i32, imgproc::LINE_8, 0)
}

fn draw_label(canvas: &mut Mat, text: &str, (x, y): (f64, f64)) -> opencv::Result<()> {
    imgproc::put_text(
        canvas,
        text,
        Point::new(x.round() as i32, y.round() as i32),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        bgr(LABEL_COLOR),
        1,
        imgproc::LINE_AA,
        false,
    )
}
