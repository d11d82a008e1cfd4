//! Hand annotation of damage locations on a rendered scan image
//!
//! Positions are stored as percentages of the image content, not of the
//! element that displays it. With `object-fit: contain` the element has
//! letterbox bars that are not part of the image; with `cover` part of the
//! image is cropped away. Both are accounted for by computing the content
//! box from the natural image size.

use chrono::Utc;
use surveyor_types::{DamageDraft, DamageType, Position, ValidationError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left
            && x <= self.left + self.width
            && y >= self.top
            && y <= self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// How the image is scaled into its element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectFit {
    /// Stretched to the element, aspect ratio ignored
    #[default]
    Fill,
    /// Scaled to fit inside, centered, with letterbox bars
    Contain,
    /// Scaled to cover the element, centered, overflow cropped
    Cover,
}

/// Geometry of the image as laid out on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedImage {
    /// Bounding box of the image element in client coordinates
    pub element: Rect,
    /// Intrinsic pixel size of the image
    pub natural: Size,
    pub fit: ObjectFit,
}

impl RenderedImage {
    pub fn new(element: Rect, natural: Size, fit: ObjectFit) -> Self {
        Self {
            element,
            natural,
            fit,
        }
    }

    /// Where the full image content is drawn, in client coordinates. For
    /// `Cover` this extends past the element.
    pub fn content_box(&self) -> Option<Rect> {
        let Rect {
            left,
            top,
            width,
            height,
        } = self.element;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        if self.fit == ObjectFit::Fill || self.natural.width <= 0.0 || self.natural.height <= 0.0 {
            return Some(self.element);
        }

        let scale_x = width / self.natural.width;
        let scale_y = height / self.natural.height;
        let scale = match self.fit {
            ObjectFit::Contain => scale_x.min(scale_y),
            _ => scale_x.max(scale_y),
        };
        let drawn_w = self.natural.width * scale;
        let drawn_h = self.natural.height * scale;

        Some(Rect::new(
            left + (width - drawn_w) / 2.0,
            top + (height - drawn_h) / 2.0,
            drawn_w,
            drawn_h,
        ))
    }

    /// Map a click to image percentages. `None` when the click is outside
    /// the element or lands on a letterbox bar.
    pub fn to_position(&self, client_x: f64, client_y: f64) -> Option<Position> {
        if !self.element.contains(client_x, client_y) {
            return None;
        }
        let content = self.content_box()?;
        if !content.contains(client_x, client_y) {
            return None;
        }

        let x_pct = ((client_x - content.left) / content.width * 100.0).clamp(0.0, 100.0);
        let y_pct = ((client_y - content.top) / content.height * 100.0).clamp(0.0, 100.0);
        Position::new(x_pct, y_pct).ok()
    }

    /// Client coordinates of a stored position, for drawing the pin
    pub fn to_client(&self, position: Position) -> Option<(f64, f64)> {
        let content = self.content_box()?;
        Some((
            content.left + position.x_pct / 100.0 * content.width,
            content.top + position.y_pct / 100.0 * content.height,
        ))
    }
}

/// Temporary id of a marker, derived from the wall clock in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(pub i64);

/// A marker whose form is open
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMarker {
    pub id: MarkerId,
    pub position: Position,
    pub damage_type: Option<DamageType>,
    pub part_name: String,
    pub notes: String,
}

/// A committed marker, handed to the caller for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct MarkedDamage {
    pub id: MarkerId,
    pub position: Position,
    pub damage_type: DamageType,
    pub part_name: String,
    pub notes: Option<String>,
}

impl From<&MarkedDamage> for DamageDraft {
    fn from(marked: &MarkedDamage) -> Self {
        let draft = DamageDraft::new(marked.damage_type.clone(), marked.part_name.clone())
            .with_position(marked.position);
        match &marked.notes {
            Some(notes) => draft.with_notes(notes.clone()),
            None => draft,
        }
    }
}

pub struct MarkingTool {
    image: RenderedImage,
    pending: Option<PendingMarker>,
    markers: Vec<MarkedDamage>,
    last_id: i64,
}

impl MarkingTool {
    pub fn new(image: RenderedImage) -> Self {
        Self {
            image,
            pending: None,
            markers: Vec::new(),
            last_id: 0,
        }
    }

    pub fn image(&self) -> &RenderedImage {
        &self.image
    }

    /// The element moved or was resized. Stored percentages are unaffected.
    pub fn resize(&mut self, image: RenderedImage) {
        self.image = image;
    }

    /// Open a marker at a click. Ignored while another marker's form is open
    /// or when the click misses the image content.
    pub fn click(&mut self, client_x: f64, client_y: f64) -> Option<MarkerId> {
        self.click_at(client_x, client_y, Utc::now().timestamp_millis())
    }

    fn click_at(&mut self, client_x: f64, client_y: f64, now_ms: i64) -> Option<MarkerId> {
        if self.pending.is_some() {
            debug!("Marker form open, click ignored");
            return None;
        }
        let position = self.image.to_position(client_x, client_y)?;

        let id = MarkerId(now_ms.max(self.last_id + 1));
        self.last_id = id.0;
        self.pending = Some(PendingMarker {
            id,
            position,
            damage_type: None,
            part_name: String::new(),
            notes: String::new(),
        });
        Some(id)
    }

    pub fn pending(&self) -> Option<&PendingMarker> {
        self.pending.as_ref()
    }

    pub fn set_type(&mut self, damage_type: DamageType) {
        if let Some(pending) = self.pending.as_mut() {
            pending.damage_type = Some(damage_type);
        }
    }

    pub fn set_part(&mut self, part_name: impl Into<String>) {
        if let Some(pending) = self.pending.as_mut() {
            pending.part_name = part_name.into();
        }
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        if let Some(pending) = self.pending.as_mut() {
            pending.notes = notes.into();
        }
    }

    /// Close the form and keep the marker. Type and part are required; on
    /// error the form stays open.
    pub fn commit(&mut self) -> Result<MarkedDamage, ValidationError> {
        let pending = self
            .pending
            .as_ref()
            .ok_or(ValidationError::IncompleteMarker)?;
        let damage_type = match &pending.damage_type {
            Some(t) if !t.as_str().trim().is_empty() => t.clone(),
            _ => return Err(ValidationError::IncompleteMarker),
        };
        if pending.part_name.trim().is_empty() {
            return Err(ValidationError::IncompleteMarker);
        }

        let marked = MarkedDamage {
            id: pending.id,
            position: pending.position,
            damage_type,
            part_name: pending.part_name.trim().to_string(),
            notes: Some(pending.notes.trim().to_string()).filter(|n| !n.is_empty()),
        };
        self.pending = None;
        self.markers.push(marked.clone());
        Ok(marked)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn remove(&mut self, id: MarkerId) -> Option<MarkedDamage> {
        let index = self.markers.iter().position(|m| m.id == id)?;
        Some(self.markers.remove(index))
    }

    pub fn markers(&self) -> &[MarkedDamage] {
        &self.markers
    }

    /// Where to draw a committed marker under the current layout
    pub fn anchor(&self, id: MarkerId) -> Option<(f64, f64)> {
        let marker = self.markers.iter().find(|m| m.id == id)?;
        self.image.to_client(marker.position)
    }
}
