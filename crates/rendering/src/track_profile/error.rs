// ---------------------------------------------------------------------------
// ProfileError: typed errors for track profile construction
// ---------------------------------------------------------------------------

use std::fmt;

/// Errors raised while parsing or validating a track profile.
///
/// Parsing returns these as values rather than unwinding; the caller decides
/// whether to substitute the built-in default profile.
#[derive(Debug)]
pub enum ProfileError {
    /// I/O error reading a profile file.
    Io(std::io::Error),
    /// A required field or attribute was absent.
    MissingField(String),
    /// A numeric field failed to parse.
    BadNumber(String),
    /// Document-level syntax error (unbalanced blocks, bad XML, wrong root).
    Malformed(String),
    /// Profile has no LODs.
    MissingLods,
    /// An LOD has no LODItems, or its cutoff radius is not positive.
    BadLod(String),
    /// An LODItem has no polylines.
    MissingPolylines(String),
    /// A polyline has no vertices.
    MissingVertices(String),
    /// A legacy-format polyline declared a zero texture-coordinate delta.
    ZeroDeltaTexCoord(String),
    /// An LODItem carries enough vertices per section to overflow 16-bit
    /// triangle indices even at the section ceiling.
    TooManyVertices { item: String, vertices: u32 },
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::Io(e) => write!(f, "I/O error: {e}"),
            ProfileError::MissingField(name) => write!(f, "missing required field {name}"),
            ProfileError::BadNumber(what) => write!(f, "malformed number in {what}"),
            ProfileError::Malformed(msg) => write!(f, "malformed profile: {msg}"),
            ProfileError::MissingLods => write!(f, "profile defines no LODs"),
            ProfileError::BadLod(msg) => write!(f, "bad LOD: {msg}"),
            ProfileError::MissingPolylines(item) => {
                write!(f, "LODItem {item} defines no polylines")
            }
            ProfileError::MissingVertices(polyline) => {
                write!(f, "polyline {polyline} defines no vertices")
            }
            ProfileError::ZeroDeltaTexCoord(polyline) => {
                write!(f, "polyline {polyline} has a zero DeltaTexCoord")
            }
            ProfileError::TooManyVertices { item, vertices } => write!(
                f,
                "LODItem {item} has {vertices} vertices per section, too many for 16-bit indices"
            ),
        }
    }
}

impl std::error::Error for ProfileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProfileError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProfileError {
    fn from(e: std::io::Error) -> Self {
        ProfileError::Io(e)
    }
}

impl From<quick_xml::Error> for ProfileError {
    fn from(e: quick_xml::Error) -> Self {
        ProfileError::Malformed(e.to_string())
    }
}
