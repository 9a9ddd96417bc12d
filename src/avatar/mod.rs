use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Number of floats in a pose: body position, then orientation triples for
/// body, head, and the up vector.
pub const POSE_LEN: usize = 12;

/// Separator between the pose half and the markup half of an avatar wire
/// string. The surrounding spaces are part of the protocol and must be
/// preserved byte-for-byte.
pub const POSE_MARKUP_SEPARATOR: &str = " . ";

/// Uniform-scale attribute inside the markup blob, e.g. `scale=&1.00~1.00~1.00`.
/// The blob uses `~` in place of spaces and `&` in place of quotes.
const SCALE_PATTERN: &str = r"scale=&[\d.]+~[\d.]+~[\d.]+";

static SCALE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SCALE_PATTERN).expect("scale pattern is valid"));

/// Position and orientation of an avatar and its head.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose(pub [f64; POSE_LEN]);

impl Pose {
    /// Parse a whitespace-separated run of exactly 12 floats.
    pub fn parse(s: &str) -> Option<Self> {
        let mut values = [0.0; POSE_LEN];
        let mut parts = s.split_whitespace();
        for value in values.iter_mut() {
            *value = parts.next()?.parse().ok()?;
        }
        parts.next().is_none().then_some(Self(values))
    }

    /// The x/y/z position triple.
    pub fn position(&self) -> [f64; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// Euclidean distance between the position triples; orientation is
    /// ignored.
    pub fn distance_to(&self, other: &Self) -> f64 {
        let a = self.position();
        let b = other.position();
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self([
            -0.0822233, -0.960175, 6.24151, // position
            0.00863815, -0.14263, -0.989738, // body orientation
            0.00863815, -0.14263, -0.989738, // head orientation
            0.00124479, 0.989776, -0.142625, // up vector
        ])
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// The bot's embodiment: where it stands, how large it is, and what it
/// looks like. The markup blob is opaque except for the scale rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub pose: Pose,
    pub scale: f64,
    pub markup: String,
}

impl Avatar {
    /// Default ghost body carrying the given display name.
    pub fn ghost(name: &str) -> Self {
        Self {
            pose: Pose::default(),
            scale: 1.0,
            markup: format!(
                "<FireBoxRoom>|<Assets>|</Assets>|<Room>|<Ghost~id=&{name}&~scale=&1.00~1.00~1.00&~/>|</Room>|</FireBoxRoom>|"
            ),
        }
    }

    /// Avatar with externally supplied markup and the default pose.
    pub fn with_markup(markup: impl Into<String>) -> Self {
        Self {
            pose: Pose::default(),
            scale: 1.0,
            markup: markup.into(),
        }
    }

    /// The full string sent with `move` messages: pose, separator, markup.
    pub fn wire_string(&self) -> String {
        format!("{}{}{}", self.pose, POSE_MARKUP_SEPARATOR, self.markup)
    }

    /// Rewrite the uniform scale factor embedded in the markup to the given
    /// value on all three axes, and remember it for distance thresholds.
    pub fn set_scale(&mut self, scale: f64) {
        let replacement = format!("scale=&{scale}~{scale}~{scale}");
        self.markup = SCALE_RE
            .replace_all(&self.markup, replacement.as_str())
            .into_owned();
        self.scale = scale;
    }
}

/// Split an avatar wire string into its pose half and markup half.
pub fn split_wire(s: &str) -> Option<(&str, &str)> {
    s.split_once(POSE_MARKUP_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_round_trips_through_display() {
        let pose = Pose::default();
        let parsed = Pose::parse(&pose.to_string()).expect("parses own output");
        assert_eq!(parsed, pose);
    }

    #[test]
    fn pose_parse_rejects_wrong_arity() {
        assert!(Pose::parse("1 2 3").is_none());
        assert!(Pose::parse("1 2 3 4 5 6 7 8 9 10 11 12 13").is_none());
        assert!(Pose::parse("1 2 3 4 5 six 7 8 9 10 11 12").is_none());
    }

    #[test]
    fn distance_uses_position_only() {
        let a = Pose([0.0; POSE_LEN]);
        let mut b = Pose([9.0; POSE_LEN]);
        b.0[0] = 0.0;
        b.0[1] = 0.0;
        b.0[2] = 2.0;
        assert_eq!(a.distance_to(&b), 2.0);
    }

    #[test]
    fn wire_string_preserves_separator_and_markup() {
        let avatar = Avatar::ghost("casper");
        let wire = avatar.wire_string();
        let (pose_part, markup) = split_wire(&wire).expect("separator present");
        assert_eq!(Pose::parse(pose_part), Some(avatar.pose));
        assert_eq!(markup, avatar.markup);
    }

    #[test]
    fn set_scale_rewrites_all_three_axes() {
        let mut avatar = Avatar::ghost("casper");
        avatar.set_scale(2.5);
        assert!(avatar.markup.contains("scale=&2.5~2.5~2.5"));
        assert!(!avatar.markup.contains("1.00"));
        assert_eq!(avatar.scale, 2.5);
    }

    #[test]
    fn set_scale_leaves_markup_without_scale_untouched() {
        let mut avatar = Avatar::with_markup("<Room>|</Room>|");
        avatar.set_scale(3.0);
        assert_eq!(avatar.markup, "<Room>|</Room>|");
        assert_eq!(avatar.scale, 3.0);
    }
}
