/// One of the two coordinate axes of the plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Returns the perpendicular axis.
    pub fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

/// A 2D bounding box represented by minimum and maximum coordinates.
///
/// `BoundingBox` is the only view of a feature geometry the tree ever sees.
/// Both edges are inclusive, so boxes that merely touch intersect, and
/// degenerate boxes (a point, or a horizontal/vertical segment) are legal.
///
/// # Examples
///
/// ```rust
/// use feature_tree::BoundingBox;
///
/// let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
/// let b = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
///
/// assert!(a.intersects(&b));
/// assert_eq!(a.join(&b), BoundingBox::new(0.0, 0.0, 20.0, 20.0));
/// ```
#[derive(Clone, Copy, PartialEq, Default, Debug, serde::Deserialize, serde::Serialize)]
pub struct BoundingBox {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BoundingBox({}, {}, {}, {})", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl BoundingBox {
    /// Creates a new bounding box with the specified coordinates.
    ///
    /// No validation happens here; see [`BoundingBox::check`].
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Creates a degenerate box covering a single point.
    pub fn point(x: f64, y: f64) -> BoundingBox {
        BoundingBox::new(x, y, x, y)
    }

    /// Returns the width of the bounding box.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Returns the height of the bounding box.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Returns the centroid coordinate along one axis.
    ///
    /// Halves before adding so boxes near `f64::MAX` stay finite.
    pub fn centroid_on(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.min_x / 2.0 + self.max_x / 2.0,
            Axis::Y => self.min_y / 2.0 + self.max_y / 2.0,
        }
    }

    /// Returns the axis along which the box is wider. Ties go to X.
    pub fn long_axis(&self) -> Axis {
        if self.width() >= self.height() {
            Axis::X
        } else {
            Axis::Y
        }
    }

    /// Split-worthiness score: `(width + 1) * (height + 1)`.
    ///
    /// The unit added to each side keeps zero-area boxes comparable, so a
    /// pile of collinear or point features still scores above 1.
    pub fn error_metric(&self) -> f64 {
        (self.width() + 1.0) * (self.height() + 1.0)
    }

    /// Checks if this bounding box intersects another bounding box.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x && self.max_x >= other.min_x
            && self.min_y <= other.max_y && self.max_y >= other.min_y
    }

    /// Returns the smallest box covering both boxes.
    pub fn join(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Returns the join of every box in `boxes`, or `None` when it is empty.
    pub fn join_all<'a, I>(boxes: I) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = &'a BoundingBox>,
    {
        let mut iter = boxes.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(first, |acc, b| acc.join(b)))
    }

    /// Checks if all four coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    /// Explains why the box cannot be indexed, if it cannot.
    pub fn check(&self) -> Result<(), &'static str> {
        if !self.is_finite() {
            return Err("coordinates must be finite");
        }
        if self.min_x > self.max_x {
            return Err("min_x is greater than max_x");
        }
        if self.min_y > self.max_y {
            return Err("min_y is greater than max_y");
        }
        Ok(())
    }
}
