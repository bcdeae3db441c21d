use serde::{Deserialize, Serialize};

/// Technical attributes of one file/version of an item as reported by a
/// source. Every field is optional because sources omit them freely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Source resolution label such as `1080`, `4k` or `sd`.
    pub resolution: Option<String>,
    pub video_codec: Option<String>,
}

impl Rendition {
    fn has_video(&self) -> bool {
        self.width.is_some()
            || self.height.is_some()
            || self.resolution.as_deref().is_some_and(|r| !r.trim().is_empty())
            || self.video_codec.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// Thresholds for the high-tier split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenditionPolicy {
    /// Minimum measured height that counts as high tier.
    pub high_tier_min_height: u32,
    /// Minimum measured width that counts as high tier (letterboxed UHD
    /// encodes report heights well under 2160).
    pub high_tier_min_width: u32,
    /// Resolution labels that count as high tier, compared case-insensitively.
    pub high_tier_labels: Vec<String>,
}

impl Default for RenditionPolicy {
    fn default() -> Self {
        Self {
            high_tier_min_height: 1800,
            high_tier_min_width: 3200,
            high_tier_labels: vec!["4k".to_string(), "2160".to_string(), "2160p".to_string()],
        }
    }
}

impl RenditionPolicy {
    fn is_high(&self, rendition: &Rendition) -> bool {
        if rendition
            .height
            .is_some_and(|h| h >= self.high_tier_min_height)
        {
            return true;
        }
        if rendition.width.is_some_and(|w| w >= self.high_tier_min_width) {
            return true;
        }
        rendition.resolution.as_deref().is_some_and(|label| {
            let label = label.trim();
            self.high_tier_labels
                .iter()
                .any(|known| known.eq_ignore_ascii_case(label))
        })
    }
}

/// Which tiers an item (or rendition) counts toward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierSet {
    pub standard: bool,
    pub high_tier: bool,
}

impl TierSet {
    pub const NONE: TierSet = TierSet {
        standard: false,
        high_tier: false,
    };

    pub fn union(self, other: TierSet) -> TierSet {
        TierSet {
            standard: self.standard || other.standard,
            high_tier: self.high_tier || other.high_tier,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.standard && !self.high_tier
    }
}

pub fn classify_rendition(
    rendition: &Rendition,
    policy: &RenditionPolicy,
    source_is_high_tier: bool,
) -> TierSet {
    if !rendition.has_video() {
        return TierSet::NONE;
    }
    if source_is_high_tier || policy.is_high(rendition) {
        TierSet {
            standard: false,
            high_tier: true,
        }
    } else {
        TierSet {
            standard: true,
            high_tier: false,
        }
    }
}

/// Union over every rendition of an item.
pub fn classify_item(
    renditions: &[Rendition],
    policy: &RenditionPolicy,
    source_is_high_tier: bool,
) -> TierSet {
    renditions
        .iter()
        .map(|r| classify_rendition(r, policy, source_is_high_tier))
        .fold(TierSet::NONE, TierSet::union)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendition(height: Option<u32>, label: Option<&str>) -> Rendition {
        Rendition {
            width: None,
            height,
            resolution: label.map(str::to_string),
            video_codec: Some("h264".into()),
        }
    }

    #[test]
    fn hd_rendition_is_standard() {
        let set = classify_rendition(
            &rendition(Some(1080), Some("1080")),
            &RenditionPolicy::default(),
            false,
        );
        assert!(set.standard);
        assert!(!set.high_tier);
    }

    #[test]
    fn uhd_by_height_or_label_is_high_tier() {
        let policy = RenditionPolicy::default();
        assert!(classify_rendition(&rendition(Some(2160), None), &policy, false).high_tier);
        assert!(classify_rendition(&rendition(None, Some("4K")), &policy, false).high_tier);
        assert!(!classify_rendition(&rendition(None, Some("4K")), &policy, false).standard);
    }

    #[test]
    fn letterboxed_uhd_counts_by_width() {
        let scope = Rendition {
            width: Some(3840),
            height: Some(1608),
            resolution: None,
            video_codec: Some("hevc".into()),
        };
        assert!(classify_rendition(&scope, &RenditionPolicy::default(), false).high_tier);
    }

    #[test]
    fn high_tier_source_counts_everything_high() {
        let set = classify_rendition(
            &rendition(Some(720), Some("720")),
            &RenditionPolicy::default(),
            true,
        );
        assert_eq!(
            set,
            TierSet {
                standard: false,
                high_tier: true
            }
        );
    }

    #[test]
    fn rendition_without_video_counts_nowhere() {
        let empty = Rendition::default();
        assert!(classify_rendition(&empty, &RenditionPolicy::default(), false).is_empty());
    }

    #[test]
    fn item_with_both_versions_counts_toward_both() {
        let set = classify_item(
            &[rendition(Some(1080), None), rendition(Some(2160), None)],
            &RenditionPolicy::default(),
            false,
        );
        assert!(set.standard && set.high_tier);
    }
}
