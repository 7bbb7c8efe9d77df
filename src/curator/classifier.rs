// Library/API classification for top-level search results
//
// Libraries are dependency-only packages with no standalone value; they are
// hidden from user-facing suggestions. The classifier is bypassed entirely
// for packages pulled in as required dependencies of a selection.

/// Classification outcome for a candidate title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Library,
    UserFacing,
}

/// Name fragments of known dependency-only library/API mods
const LIBRARY_NAME_PATTERNS: &[&str] = &[
    "cloth config",
    "ferrite",
    "yacl",
    "yet another config",
    "architectury",
    "geckolib",
    "puzzles lib",
    "forge config api",
    "creative", // CreativeCore
    "libipn",
    "resourceful",
    "supermartijn", // config libs
    "fzzy config",
    "midnight", // MidnightLib
    "kotlin for forge",
    "lib ", // "lib " prefix
    " lib", // " lib" suffix
];

/// Core loader APIs that stay user-visible even though they match the
/// deny-list shape
const LOADER_API_ALLOWLIST: &[&str] = &[
    "fabric api",
    "fabric-api",
    "fabric loader",
    "fabric-loader",
];

/// Classify a candidate by title. A missing or empty title is always a
/// library: unnamed entries are excluded from user-facing results.
pub fn classify(title: Option<&str>) -> Classification {
    let name = match title {
        Some(t) if !t.trim().is_empty() => t.to_lowercase(),
        _ => return Classification::Library,
    };

    for allowed in LOADER_API_ALLOWLIST {
        if name.contains(allowed) {
            return Classification::UserFacing;
        }
    }

    for pattern in LIBRARY_NAME_PATTERNS {
        if name.contains(pattern) {
            return Classification::Library;
        }
    }

    Classification::UserFacing
}

/// Convenience predicate over [`classify`]
pub fn is_library(title: Option<&str>) -> bool {
    classify(title) == Classification::Library
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_libraries_are_filtered() {
        assert_eq!(classify(Some("Cloth Config API")), Classification::Library);
        assert_eq!(classify(Some("Architectury API")), Classification::Library);
        assert_eq!(classify(Some("GeckoLib")), Classification::Library);
        assert_eq!(classify(Some("Kotlin for Forge")), Classification::Library);
    }

    #[test]
    fn gameplay_mods_pass() {
        assert_eq!(classify(Some("Sodium")), Classification::UserFacing);
        assert_eq!(classify(Some("Create")), Classification::UserFacing);
        assert_eq!(classify(Some("Biomes O' Plenty")), Classification::UserFacing);
    }

    #[test]
    fn allowlist_overrides_denylist() {
        // "Fabric API" would otherwise hit the " api"-ish library shape
        assert_eq!(classify(Some("Fabric API")), Classification::UserFacing);
        assert_eq!(classify(Some("fabric-loader")), Classification::UserFacing);
    }

    #[test]
    fn missing_title_is_a_library() {
        assert_eq!(classify(None), Classification::Library);
        assert_eq!(classify(Some("")), Classification::Library);
        assert_eq!(classify(Some("   ")), Classification::Library);
        assert!(is_library(None));
    }
}
