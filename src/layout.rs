//! Layouts combine a papersize with book-level style choices into the flat
//! description consumed by the typesetting engine.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SongbookError;
use crate::geometry::Papersize;

/// Template used when a layout does not name one.
pub const DEFAULT_TEMPLATE: &str = "data.tex";

/// Sheets at least this wide (mm) get one more column than usual.
pub const WIDE_SHEET_MM: u32 = 297;
/// Sheets at most this wide (mm) are limited to a single column.
pub const NARROW_SHEET_MM: u32 = 148;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookType {
    #[default]
    Chorded,
    Lyric,
}

impl BookType {
    pub const ALL: [BookType; 2] = [BookType::Chorded, BookType::Lyric];

    pub fn as_str(self) -> &'static str {
        match self {
            BookType::Chorded => "chorded",
            BookType::Lyric => "lyric",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BookType::Chorded => "With chords",
            BookType::Lyric => "Lyrics only",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        BookType::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "Portrait"),
            Orientation::Landscape => write!(f, "Landscape"),
        }
    }
}

/// Book-level style toggles understood by the typesetting templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookOptions {
    pub diagram: bool,
    pub importantdiagramonly: bool,
    pub lilypond: bool,
    pub pictures: bool,
    pub repeatchords: bool,
    pub onesongperpage: bool,
}

/// Orientation plus any additional template settings. Everything here is
/// merged flat into the layout description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OtherOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl OtherOptions {
    pub fn with_orientation(orientation: Orientation) -> Self {
        Self {
            orientation: Some(orientation),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAdjustment {
    OneMore,
    OnlyOne,
    None,
}

impl ColumnAdjustment {
    /// Pick the column heuristic for a printed width in millimeters.
    pub fn for_width(width: u32) -> Self {
        if width >= WIDE_SHEET_MM {
            ColumnAdjustment::OneMore
        } else if width <= NARROW_SHEET_MM {
            ColumnAdjustment::OnlyOne
        } else {
            ColumnAdjustment::None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnAdjustment::OneMore => "one_more",
            ColumnAdjustment::OnlyOne => "only_one",
            ColumnAdjustment::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub id: i64,
    pub owner: String,
    pub booktype: BookType,
    pub papersize: Papersize,
    pub bookoptions: BookOptions,
    pub other_options: OtherOptions,
    pub template: String,
}

impl Layout {
    pub fn new(owner: impl Into<String>, papersize: Papersize, orientation: Orientation) -> Self {
        Self {
            id: 0,
            owner: owner.into(),
            booktype: BookType::default(),
            papersize,
            bookoptions: BookOptions::default(),
            other_options: OtherOptions::with_orientation(orientation),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    /// The only place the orientation is read from.
    pub fn orientation(&self) -> Result<Orientation, SongbookError> {
        self.other_options
            .orientation
            .ok_or(SongbookError::MissingOrientation { layout_id: self.id })
    }

    pub fn is_landscape(&self) -> Result<bool, SongbookError> {
        Ok(self.orientation()? == Orientation::Landscape)
    }

    /// Label such as `A4 Landscape`.
    pub fn name(&self) -> Result<String, SongbookError> {
        Ok(format!("{} {}", self.papersize.name, self.orientation()?))
    }

    pub fn booktype_name(&self) -> &'static str {
        self.booktype.label()
    }

    /// Width of the printed page, used for the column heuristic.
    pub fn used_width(&self) -> Result<u32, SongbookError> {
        let (width, _) = self.papersize.oriented_dimensions(self.is_landscape()?);
        Ok(width)
    }

    pub fn column_adjustment(&self) -> Result<ColumnAdjustment, SongbookError> {
        Ok(ColumnAdjustment::for_width(self.used_width()?))
    }

    /// Flat mapping handed to the typesetting engine: book type, options and
    /// template, then every entry of `other_options`, then the computed
    /// `geometry` and `column_adjustment`. Later entries overwrite earlier
    /// ones on key collisions.
    pub fn description(&self) -> Result<Map<String, Value>, SongbookError> {
        let landscape = self.is_landscape()?;

        let mut layout = Map::new();
        layout.insert("booktype".into(), Value::from(self.booktype.as_str()));
        layout.insert(
            "bookoptions".into(),
            to_value("book options", &self.bookoptions)?,
        );
        layout.insert("template".into(), Value::from(self.template.clone()));

        if let Value::Object(other) = to_value("layout options", &self.other_options)? {
            layout.extend(other);
        }

        let geometry = self.papersize.geometry_directives(landscape).join(",\n  ");
        layout.insert("geometry".into(), Value::from(geometry));
        layout.insert(
            "column_adjustment".into(),
            Value::from(self.column_adjustment()?.as_str()),
        );

        Ok(layout)
    }
}

fn to_value<T: Serialize>(what: &'static str, value: &T) -> Result<Value, SongbookError> {
    serde_json::to_value(value).map_err(|err| SongbookError::Encoding {
        what,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not representable"))
        }
    }

    #[test]
    fn encoding_failures_are_reported() {
        let err = to_value("book options", &Unencodable).unwrap_err();
        assert_eq!(
            err,
            SongbookError::Encoding {
                what: "book options",
                message: "not representable".to_string(),
            }
        );
    }

    fn layout(width: u32, height: u32, orientation: Orientation) -> Layout {
        Layout::new("alice", Papersize::new("Test", width, height), orientation)
    }

    #[test]
    fn column_thresholds() {
        assert_eq!(ColumnAdjustment::for_width(300), ColumnAdjustment::OneMore);
        assert_eq!(ColumnAdjustment::for_width(297), ColumnAdjustment::OneMore);
        assert_eq!(ColumnAdjustment::for_width(200), ColumnAdjustment::None);
        assert_eq!(ColumnAdjustment::for_width(149), ColumnAdjustment::None);
        assert_eq!(ColumnAdjustment::for_width(148), ColumnAdjustment::OnlyOne);
    }

    #[test]
    fn landscape_a4_uses_long_edge_for_columns() {
        let portrait = layout(210, 297, Orientation::Portrait);
        let landscape = layout(210, 297, Orientation::Landscape);
        assert_eq!(portrait.column_adjustment().unwrap(), ColumnAdjustment::None);
        assert_eq!(
            landscape.column_adjustment().unwrap(),
            ColumnAdjustment::OneMore
        );
    }

    #[test]
    fn portrait_a5_is_single_column() {
        let a5 = layout(148, 210, Orientation::Portrait);
        assert_eq!(a5.column_adjustment().unwrap(), ColumnAdjustment::OnlyOne);
    }

    #[test]
    fn description_merges_options_and_geometry() {
        let mut a4 = layout(210, 297, Orientation::Landscape);
        a4.bookoptions.diagram = true;
        a4.other_options
            .extra
            .insert("instruments".into(), Value::from("guitar"));

        let description = a4.description().unwrap();
        assert_eq!(description["booktype"], "chorded");
        assert_eq!(description["template"], DEFAULT_TEMPLATE);
        assert_eq!(description["orientation"], "landscape");
        assert_eq!(description["instruments"], "guitar");
        assert_eq!(description["bookoptions"]["diagram"], true);
        assert_eq!(description["column_adjustment"], "one_more");
        assert_eq!(
            description["geometry"],
            "paperwidth=297mm,\n  paperheight=210mm,\n  asymmetric,\n  right=15mm,\n  \
             bottom=15mm,\n  left=15mm,\n  top=15mm,\n  bindingoffset=0mm"
        );
    }

    #[test]
    fn missing_orientation_is_a_precondition_failure() {
        let mut a4 = layout(210, 297, Orientation::Portrait);
        a4.id = 7;
        a4.other_options.orientation = None;

        let expected = SongbookError::MissingOrientation { layout_id: 7 };
        assert_eq!(a4.description().unwrap_err(), expected);
        assert_eq!(a4.name().unwrap_err(), expected);
    }

    #[test]
    fn name_follows_orientation() {
        assert_eq!(
            layout(210, 297, Orientation::Portrait).name().unwrap(),
            "Test Portrait"
        );
        assert_eq!(
            layout(210, 297, Orientation::Landscape).name().unwrap(),
            "Test Landscape"
        );
    }

    #[test]
    fn other_options_round_trip_through_json() {
        let json = r#"{"orientation":"landscape","font":"Lato"}"#;
        let options: OtherOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.orientation, Some(Orientation::Landscape));
        assert_eq!(options.extra["font"], "Lato");

        let bare: OtherOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(bare.orientation, None);
    }
}
