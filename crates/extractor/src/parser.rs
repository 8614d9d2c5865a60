//! Line classification for yt-dlp output.
//!
//! Scraping a tool's human-readable output is inherently fragile across tool
//! versions, so every pattern lives here as a pure function over one line.
//! Most subprocess chatter matches nothing, and that is normal: one line in,
//! zero or one classification out.

use std::sync::OnceLock;

use regex::Regex;

/// Metadata recovered from the probe stage.
///
/// The probe is invoked with `--print title --print duration`, so its stdout
/// is exactly two designated lines in fixed order: the human-readable title,
/// then the duration in (possibly fractional) seconds. A missing or
/// unparsable duration is a genuine unknown, not a zero-length video.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeInfo {
    pub title: String,
    pub duration_secs: Option<f64>,
}

/// Parse the collected probe stdout lines. Returns `None` when no usable
/// title was printed.
pub fn parse_probe_output(lines: &[String]) -> Option<ProbeInfo> {
    let mut fields = lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty());

    let title = fields.next()?.to_string();
    let duration_secs = fields.next().and_then(|l| l.parse::<f64>().ok());

    Some(ProbeInfo {
        title,
        duration_secs,
    })
}

/// One rule for recognizing a destination announcement in extract output.
///
/// yt-dlp prints a destination line both for the intermediate extracted-audio
/// step and for the final-format file, and different tool versions order the
/// two differently. Rules carry an explicit priority instead of relying on
/// line order: the highest-priority match observed so far names the output
/// file, whatever order the lines arrived in.
#[derive(Debug, Clone)]
pub struct DestinationRule {
    /// Substring that marks the line as a destination announcement.
    pub marker: String,
    /// When set, the announced path must carry this extension.
    pub extension: Option<String>,
    pub priority: u8,
}

#[derive(Debug, Clone)]
pub struct DestinationRules {
    rules: Vec<DestinationRule>,
}

impl DestinationRules {
    /// Default rules for a given target extension: the `[ExtractAudio]` step
    /// announcement, overridden by any destination already in the target
    /// format.
    pub fn for_extension(extension: &str) -> Self {
        Self {
            rules: vec![
                DestinationRule {
                    marker: "[ExtractAudio] Destination:".to_string(),
                    extension: None,
                    priority: 1,
                },
                DestinationRule {
                    marker: "Destination:".to_string(),
                    extension: Some(extension.to_string()),
                    priority: 2,
                },
            ],
        }
    }

    pub fn custom(rules: Vec<DestinationRule>) -> Self {
        Self { rules }
    }

    /// Match a line against the rules, best priority first. Returns the
    /// announced filename (trailing path component) and the rule priority.
    pub fn match_line(&self, line: &str) -> Option<(String, u8)> {
        let mut by_priority: Vec<&DestinationRule> = self.rules.iter().collect();
        by_priority.sort_by(|a, b| b.priority.cmp(&a.priority));

        for rule in by_priority {
            let Some(pos) = line.find(&rule.marker) else {
                continue;
            };
            let path = line[pos + rule.marker.len()..].trim();
            if path.is_empty() {
                continue;
            }
            let filename = path
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(path)
                .to_string();
            if let Some(ref ext) = rule.extension
                && !filename.ends_with(&format!(".{ext}"))
            {
                continue;
            }
            return Some((filename, rule.priority));
        }
        None
    }
}

/// Caller-owned record of the best output-filename candidate seen so far.
#[derive(Debug, Default)]
pub struct FilenameCandidate {
    name: Option<String>,
    priority: u8,
}

impl FilenameCandidate {
    /// Record a candidate unless a strictly higher-priority one is already
    /// held. Equal priority takes the newer name (later announcement of the
    /// same kind supersedes).
    pub fn offer(&mut self, name: String, priority: u8) {
        if self.name.is_none() || priority >= self.priority {
            self.name = Some(name);
            self.priority = priority;
        }
    }

    pub fn take(self) -> Option<String> {
        self.name
    }

    pub fn get(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// One classified line of extract-stage output.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractLine {
    /// A percentage token, e.g. `42.0%`.
    Percent(String),
    /// A destination announcement naming a candidate output file.
    Destination { filename: String, priority: u8 },
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("hardcoded regex compiles"))
}

/// Classify one extract-stage line. Destination announcements win over a
/// percentage appearing in the same line.
pub fn parse_extract_line(line: &str, rules: &DestinationRules) -> Option<ExtractLine> {
    if let Some((filename, priority)) = rules.match_line(line) {
        return Some(ExtractLine::Destination { filename, priority });
    }

    percent_re()
        .find(line)
        .map(|m| ExtractLine::Percent(m.as_str().to_string()))
}
