use crate::utils::odds_selector::normalize_sportsbook_name;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Locally hosted logo files, keyed by normalized sportsbook name
const LOCAL_LOGO_FILES: &[(&str, &str)] = &[
    ("pinnacle", "Pinnacle.png"),
    ("circa", "Circa.png"),
    ("fanduel", "FanDuel.png"),
    ("draftkings", "DraftKings.png"),
    ("betmgm", "BetMGM.png"),
    ("bovada", "Bovada.png"),
    ("betonline", "BetOnline.png"),
    ("bookmaker", "Bookmaker.png"),
    ("betrivers", "BetRivers.png"),
    ("caesars", "Caesars.png"),
    ("pointsbet", "PointsBet.png"),
    ("wynnbet", "WynnBET.png"),
    ("espnbet", "ESPN Bet.png"),
    ("fanatics", "Fanatics.png"),
    ("bet365", "bet365.png"),
];

/// Sportsbook domains used for the favicon fallback
const EXTERNAL_LOGO_DOMAINS: &[(&str, &str)] = &[
    ("pinnacle", "pinnacle.com"),
    ("circa", "circasports.com"),
    ("fanduel", "fanduel.com"),
    ("draftkings", "draftkings.com"),
    ("betmgm", "betmgm.com"),
    ("bovada", "bovada.lv"),
    ("betonline", "betonline.ag"),
    ("bookmaker", "bookmaker.eu"),
    ("betrivers", "betrivers.com"),
    ("caesars", "caesars.com"),
    ("pointsbet", "pointsbet.com"),
    ("wynnbet", "wynnbet.com"),
    ("espnbet", "espnbet.com"),
    ("fanatics", "sportsbook.fanatics.com"),
    ("bet365", "bet365.com"),
];

const BRAND_COLORS: &[(&str, &str)] = &[
    ("espnbet", "#d50000"),
    ("fanatics", "#0066cc"),
    ("fanduel", "#1e3a8a"),
    ("draftkings", "#f59e0b"),
    ("betmgm", "#059669"),
    ("caesars", "#dc2626"),
    ("caesers", "#dc2626"),
    ("bet365", "#ffb400"),
    ("unabated", "#4a90e2"),
    ("betrivers", "#0891b2"),
    ("pointsbet", "#7c3aed"),
    ("wynnbet", "#be123c"),
    ("bovada", "#ea580c"),
    ("betonline", "#16a34a"),
    ("bookmaker", "#0f172a"),
    ("pinnacle", "#dc2626"),
    ("circa", "#f59e0b"),
];

const PLACEHOLDER_PALETTE: &[&str] = &[
    "#4a90e2", "#7c3aed", "#059669", "#dc2626", "#0891b2", "#ea580c", "#be123c", "#16a34a",
];

/// One candidate image for a sportsbook header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogoSource {
    /// `<logo-dir>/<file>`, served at `/logos/<file>`
    Local { file: String },
    External { url: String },
    /// Letter on a colored tile; always renders
    Placeholder { initial: char, color: String },
}

impl LogoSource {
    /// Image URL, or `None` for the inline placeholder
    pub fn url(&self) -> Option<String> {
        match self {
            LogoSource::Local { file } => Some(format!("/logos/{}", encode_path_segment(file))),
            LogoSource::External { url } => Some(url.clone()),
            LogoSource::Placeholder { .. } => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, LogoSource::Placeholder { .. })
    }
}

/// Resolves sportsbook logos: local file, then external URL, then a
/// generated placeholder
#[derive(Debug, Clone, Default)]
pub struct LogoResolver {
    logo_dir: PathBuf,
    local_files: HashSet<String>,
}

impl LogoResolver {
    pub fn new(logo_dir: impl Into<PathBuf>, local_files: HashSet<String>) -> Self {
        Self {
            logo_dir: logo_dir.into(),
            local_files,
        }
    }

    /// Build a resolver from the files present in `logo_dir`
    pub fn scan(logo_dir: impl Into<PathBuf>) -> Self {
        let logo_dir = logo_dir.into();
        let local_files = match std::fs::read_dir(&logo_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect(),
            Err(e) => {
                debug!("No logo directory at {}: {}", logo_dir.display(), e);
                HashSet::new()
            }
        };
        Self::new(logo_dir, local_files)
    }

    /// Every tier that applies to `name`, in order. The placeholder is
    /// always last.
    pub fn candidates<'a>(&'a self, name: &'a str) -> impl Iterator<Item = LogoSource> + 'a {
        let key = normalize_sportsbook_name(name);
        let local = lookup(LOCAL_LOGO_FILES, &key).map(|file| LogoSource::Local {
            file: file.to_string(),
        });
        let external = lookup(EXTERNAL_LOGO_DOMAINS, &key).map(|domain| LogoSource::External {
            url: format!("https://www.google.com/s2/favicons?domain={}&sz=64", domain),
        });

        local
            .into_iter()
            .chain(external)
            .chain(std::iter::once_with(move || placeholder(name)))
    }

    /// First candidate that `is_available` accepts. Candidates are tried
    /// lazily and the placeholder is accepted unconditionally.
    pub fn resolve_with(
        &self,
        name: &str,
        mut is_available: impl FnMut(&LogoSource) -> bool,
    ) -> LogoSource {
        self.candidates(name)
            .find(|candidate| candidate.is_placeholder() || is_available(candidate))
            .unwrap_or_else(|| placeholder(name))
    }

    /// Local files count only when present on disk; external URLs are
    /// assumed reachable and left to the browser's fallback
    pub fn resolve(&self, name: &str) -> LogoSource {
        self.resolve_with(name, |candidate| match candidate {
            LogoSource::Local { file } => self.local_files.contains(file),
            LogoSource::External { .. } | LogoSource::Placeholder { .. } => true,
        })
    }

    /// File to serve for `GET /logos/{requested}`: the exact file name, the
    /// mapped file for a known sportsbook, then the lower-cased name with a
    /// known image extension
    pub fn find_file(&self, requested: &str) -> Option<PathBuf> {
        if requested.is_empty()
            || requested.contains('/')
            || requested.contains('\\')
            || requested.contains("..")
        {
            return None;
        }

        let direct = self.logo_dir.join(requested);
        if direct.is_file() {
            return Some(direct);
        }

        if let Some(file) = lookup(LOCAL_LOGO_FILES, &normalize_sportsbook_name(requested)) {
            let mapped = self.logo_dir.join(file);
            if mapped.is_file() {
                return Some(mapped);
            }
        }

        let lower = requested.to_lowercase();
        ["png", "jpg", "jpeg", "svg"]
            .iter()
            .map(|ext| self.logo_dir.join(format!("{}.{}", lower, ext)))
            .find(|path| path.is_file())
    }
}

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
}

/// Deterministic tile color: brand color when known, else a palette slot
/// chosen from the name's bytes
pub fn placeholder_color(name: &str) -> String {
    let key = normalize_sportsbook_name(name);
    if let Some(color) = lookup(BRAND_COLORS, &key) {
        return color.to_string();
    }
    let sum = key
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    PLACEHOLDER_PALETTE[sum % PLACEHOLDER_PALETTE.len()].to_string()
}

pub fn placeholder(name: &str) -> LogoSource {
    LogoSource::Placeholder {
        initial: name
            .chars()
            .find(|c| c.is_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?'),
        color: placeholder_color(name),
    }
}

/// 32x32 SVG tile for a placeholder logo
pub fn placeholder_svg(name: &str) -> String {
    let (initial, color) = match placeholder(name) {
        LogoSource::Placeholder { initial, color } => (initial, color),
        _ => ('?', PLACEHOLDER_PALETTE[0].to_string()),
    };
    format!(
        r#"<svg width="32" height="32" viewBox="0 0 32 32" xmlns="http://www.w3.org/2000/svg"><rect width="32" height="32" rx="6" fill="{}"/><text x="16" y="22" font-family="Arial, sans-serif" font-size="16" font-weight="bold" fill="white" text-anchor="middle">{}</text></svg>"#,
        color,
        escape_xml(&initial.to_string())
    )
}

pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn escape_xml(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub(crate) fn encode_path_segment(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '#' => "%23".to_string(),
            '?' => "%3F".to_string(),
            '%' => "%25".to_string(),
            other => other.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with(files: &[&str]) -> LogoResolver {
        LogoResolver::new("logos", files.iter().map(|f| f.to_string()).collect())
    }

    #[test]
    fn test_tiers_in_order() {
        let resolver = resolver_with(&[]);
        let candidates: Vec<LogoSource> = resolver.candidates("DraftKings").collect();
        assert_eq!(candidates.len(), 3);
        assert_eq!(
            candidates[0],
            LogoSource::Local {
                file: "DraftKings.png".to_string()
            }
        );
        assert!(matches!(candidates[1], LogoSource::External { .. }));
        assert!(candidates[2].is_placeholder());

        // Unknown books only get the placeholder
        let candidates: Vec<LogoSource> = resolver.candidates("Joe's Book").collect();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_resolve_uses_local_file_when_present() {
        let resolver = resolver_with(&["FanDuel.png"]);
        assert_eq!(
            resolver.resolve("fanduel"),
            LogoSource::Local {
                file: "FanDuel.png".to_string()
            }
        );
        // No file on disk, so the external URL is next
        assert!(matches!(
            resolver.resolve("BetMGM"),
            LogoSource::External { .. }
        ));
    }

    #[test]
    fn test_resolve_advances_on_failure_and_placeholder_never_fails() {
        let resolver = resolver_with(&["Caesars.png"]);
        let mut tried = Vec::new();
        let logo = resolver.resolve_with("Caesars", |candidate| {
            tried.push(candidate.clone());
            false
        });
        assert_eq!(tried.len(), 2);
        assert_eq!(
            logo,
            LogoSource::Placeholder {
                initial: 'C',
                color: "#dc2626".to_string()
            }
        );
    }

    #[test]
    fn test_resolve_is_lazy() {
        let resolver = resolver_with(&[]);
        let mut tried = 0;
        resolver.resolve_with("Pinnacle", |_| {
            tried += 1;
            true
        });
        assert_eq!(tried, 1);
    }

    #[test]
    fn test_placeholder_color_is_deterministic() {
        assert_eq!(placeholder_color("Some New Book"), placeholder_color("some-new-book"));
        assert_eq!(placeholder_color("DraftKings"), "#f59e0b");
        assert!(PLACEHOLDER_PALETTE.contains(&placeholder_color("zzz").as_str()));
    }

    #[test]
    fn test_placeholder_svg() {
        let svg = placeholder_svg("bovada");
        assert!(svg.contains(">B</text>"));
        assert!(svg.contains("#ea580c"));
        assert!(placeholder_svg("").contains(">?</text>"));
    }

    #[test]
    fn test_local_url_is_encoded() {
        let logo = LogoSource::Local {
            file: "ESPN Bet.png".to_string(),
        };
        assert_eq!(logo.url().as_deref(), Some("/logos/ESPN%20Bet.png"));
    }

    #[test]
    fn test_find_file_rejects_traversal() {
        let resolver = resolver_with(&[]);
        assert!(resolver.find_file("../Cargo.toml").is_none());
        assert!(resolver.find_file("a/b.png").is_none());
        assert!(resolver.find_file("").is_none());
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type_for(Path::new("x/FanDuel.PNG")), "image/png");
        assert_eq!(content_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.svg")), "image/svg+xml");
    }
}
