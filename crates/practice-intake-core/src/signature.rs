//! Freehand signature capture.
//!
//! The pad tracks pointer and touch strokes and hands line segments to a
//! [`SignatureSurface`], which owns the pixels. When a stroke is released
//! the surface is serialized to an image data URI; that string is the
//! signature value stored on the session.

/// A point on the surface, relative to its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Drawing surface rendered by the UI shell.
pub trait SignatureSurface {
    /// Draw a line segment.
    fn line(&mut self, from: Point, to: Point);

    /// Erase everything.
    fn clear(&mut self);

    /// Paint a previously saved signature.
    fn load(&mut self, data_uri: &str);

    /// Serialize the current pixels, e.g. `data:image/png;base64,...`.
    fn to_data_uri(&self) -> String;
}

/// Stroke tracking over a drawing surface.
pub struct SignaturePad<S: SignatureSurface> {
    surface: S,
    last: Option<Point>,
    value: Option<String>,
}

impl<S: SignatureSurface> SignaturePad<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            last: None,
            value: None,
        }
    }

    /// Pointer or touch pressed.
    pub fn pointer_down(&mut self, at: Point) {
        self.last = Some(at);
    }

    /// Pointer or touch moved; draws only while pressed.
    pub fn pointer_move(&mut self, to: Point) {
        if let Some(from) = self.last {
            self.surface.line(from, to);
            self.last = Some(to);
        }
    }

    /// Pointer released or left the surface. Ends the stroke and saves.
    pub fn pointer_up(&mut self) {
        if self.last.take().is_some() {
            self.value = Some(self.surface.to_data_uri());
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.last.is_some()
    }

    /// The saved signature, if anything has been drawn.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Erase the surface and the saved value.
    pub fn clear(&mut self) {
        self.last = None;
        self.surface.clear();
        self.value = None;
    }

    /// Show an existing signature when editing; `None` clears the pad.
    pub fn load(&mut self, data_uri: Option<&str>) {
        self.clear();
        if let Some(uri) = data_uri.filter(|u| !u.is_empty()) {
            self.surface.load(uri);
            self.value = Some(uri.to_string());
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records segments and serializes them as text.
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        pub segments: Vec<(Point, Point)>,
        pub loaded: Option<String>,
    }

    impl SignatureSurface for RecordingSurface {
        fn line(&mut self, from: Point, to: Point) {
            self.segments.push((from, to));
        }

        fn clear(&mut self) {
            self.segments.clear();
            self.loaded = None;
        }

        fn load(&mut self, data_uri: &str) {
            self.loaded = Some(data_uri.to_string());
        }

        fn to_data_uri(&self) -> String {
            format!("data:image/png;base64,segments-{}", self.segments.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSurface;
    use super::*;

    #[test]
    fn test_serializes_on_release() {
        let mut pad = SignaturePad::new(RecordingSurface::default());
        pad.pointer_move(Point::new(5.0, 5.0));
        assert!(pad.surface().segments.is_empty());

        pad.pointer_down(Point::new(0.0, 0.0));
        pad.pointer_move(Point::new(10.0, 0.0));
        pad.pointer_move(Point::new(10.0, 10.0));
        assert!(pad.is_drawing());
        assert_eq!(pad.value(), None);

        pad.pointer_up();
        assert!(!pad.is_drawing());
        assert_eq!(pad.value(), Some("data:image/png;base64,segments-2"));
        assert_eq!(
            pad.surface().segments[1],
            (Point::new(10.0, 0.0), Point::new(10.0, 10.0))
        );
    }

    #[test]
    fn test_release_without_stroke_keeps_value() {
        let mut pad = SignaturePad::new(RecordingSurface::default());
        pad.pointer_up();
        assert_eq!(pad.value(), None);
    }

    #[test]
    fn test_clear_and_load() {
        let mut pad = SignaturePad::new(RecordingSurface::default());
        pad.pointer_down(Point::new(0.0, 0.0));
        pad.pointer_move(Point::new(1.0, 1.0));
        pad.pointer_up();

        pad.clear();
        assert_eq!(pad.value(), None);
        assert!(pad.surface().segments.is_empty());

        pad.load(Some("data:image/png;base64,AAAA"));
        assert_eq!(pad.value(), Some("data:image/png;base64,AAAA"));
        assert_eq!(
            pad.surface().loaded.as_deref(),
            Some("data:image/png;base64,AAAA")
        );

        pad.load(None);
        assert_eq!(pad.value(), None);
    }
}
