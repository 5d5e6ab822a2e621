use std::collections::BTreeMap;

use serde::Serialize;

use crate::ir::{Graph, Group};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutRole {
    Lane,
    Section,
    Boundary,
}

impl LayoutRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lane => "lane",
            Self::Section => "section",
            Self::Boundary => "boundary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutInfo {
    pub role: LayoutRole,
    pub index: usize,
    pub badge_label: String,
    /// Provider word found in a boundary group's id or label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<&'static str>,
}

/// Layout roles keyed by group id. Groups without a role are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    infos: BTreeMap<String, LayoutInfo>,
}

impl Classification {
    pub fn get(&self, group_id: &str) -> Option<&LayoutInfo> {
        self.infos.get(group_id)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// False when no group carries a lane, section or boundary role; the
    /// caller should then use a plain layout instead.
    pub fn has_lane_metadata(&self) -> bool {
        !self.infos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LayoutInfo)> {
        self.infos.iter().map(|(id, info)| (id.as_str(), info))
    }

    /// Group ids with `role`, ordered by their index.
    pub fn with_role(&self, role: LayoutRole) -> Vec<(&str, &LayoutInfo)> {
        let mut items: Vec<(&str, &LayoutInfo)> =
            self.iter().filter(|(_, info)| info.role == role).collect();
        items.sort_by_key(|(_, info)| info.index);
        items
    }

    pub fn lanes(&self) -> Vec<(&str, &LayoutInfo)> {
        self.with_role(LayoutRole::Lane)
    }

    pub fn sections(&self) -> Vec<(&str, &LayoutInfo)> {
        self.with_role(LayoutRole::Section)
    }

    pub fn boundaries(&self) -> Vec<(&str, &LayoutInfo)> {
        self.with_role(LayoutRole::Boundary)
    }
}

/// What a rule may look at for one group.
#[derive(Debug, Clone)]
pub struct GroupFacts<'a> {
    pub id: &'a str,
    pub label: &'a str,
    pub depth: usize,
    pub child_groups: Vec<(&'a str, &'a str)>,
    /// Lower-cased id and label with non-alphanumerics folded to single
    /// spaces and padded, so ` word ` finds whole words.
    words: String,
}

impl<'a> GroupFacts<'a> {
    pub fn from_group(graph: &'a Graph, group: &'a Group) -> Self {
        let child_groups = group
            .child_group_ids()
            .filter_map(|id| graph.group(id))
            .map(|child| (child.id.as_str(), child.label.as_str()))
            .collect();
        Self {
            id: &group.id,
            label: &group.label,
            depth: group.depth,
            child_groups,
            words: word_text(&[&group.id, &group.label]),
        }
    }

    fn has_word(&self, word: &str) -> bool {
        self.words.contains(&format!(" {word} "))
    }

    pub fn provider(&self) -> Option<&'static str> {
        PROVIDER_WORDS
            .iter()
            .find(|(word, _)| self.has_word(word))
            .map(|(_, provider)| *provider)
    }

    fn has_container_word(&self) -> bool {
        CONTAINER_WORDS.iter().any(|word| self.has_word(word))
    }

    fn has_ordering_token(&self) -> bool {
        lane_token(self.id, self.label).is_some() || section_token(self.id, self.label).is_some()
    }
}

const PROVIDER_WORDS: [(&str, &str); 6] = [
    ("snowflake", "snowflake"),
    ("aws", "aws"),
    ("amazon", "amazon"),
    ("azure", "azure"),
    ("gcp", "gcp"),
    ("google cloud", "google_cloud"),
];

const CONTAINER_WORDS: [&str; 4] = ["boundary", "account", "vpc", "tenant"];

pub struct ClassifierRule {
    pub role: LayoutRole,
    pub name: &'static str,
    pub matches: fn(&GroupFacts) -> bool,
}

/// Evaluated top to bottom; the first match wins. Boundary rules come before
/// lane rules, which come before section rules.
pub static CLASSIFIER_RULES: &[ClassifierRule] = &[
    ClassifierRule {
        role: LayoutRole::Boundary,
        name: "provider-or-container-word",
        matches: |facts| {
            (facts.provider().is_some() || facts.has_container_word())
                && (!facts.child_groups.is_empty() || !facts.has_ordering_token())
        },
    },
    ClassifierRule {
        role: LayoutRole::Boundary,
        name: "outermost-container",
        matches: |facts| {
            facts.depth == 0
                && !facts.has_ordering_token()
                && !has_role_keyword(facts.id)
                && facts
                    .child_groups
                    .iter()
                    .any(|(id, label)| looks_like_lane_or_section(id, label))
        },
    },
    ClassifierRule {
        role: LayoutRole::Lane,
        name: "alphanumeric-token",
        matches: |facts| lane_token(facts.id, facts.label).is_some(),
    },
    ClassifierRule {
        role: LayoutRole::Lane,
        name: "lane-keyword",
        matches: |facts| facts.id.to_ascii_lowercase().starts_with("lane"),
    },
    ClassifierRule {
        role: LayoutRole::Section,
        name: "numeric-token",
        matches: |facts| section_token(facts.id, facts.label).is_some(),
    },
    ClassifierRule {
        role: LayoutRole::Section,
        name: "section-keyword",
        matches: |facts| {
            let id = facts.id.to_ascii_lowercase();
            SECTION_KEYWORDS.iter().any(|kw| id.starts_with(kw))
        },
    },
];

const SECTION_KEYWORDS: [&str; 3] = ["section", "stage", "step"];

pub fn classify_groups(graph: &Graph) -> Classification {
    let mut infos = BTreeMap::new();
    let mut next_index: BTreeMap<LayoutRole, usize> = BTreeMap::new();

    for group in &graph.groups {
        let facts = GroupFacts::from_group(graph, group);
        let Some(rule) = CLASSIFIER_RULES.iter().find(|rule| (rule.matches)(&facts)) else {
            tracing::trace!(group = %group.id, "group has no layout role");
            continue;
        };
        let counter = next_index.entry(rule.role).or_insert(0);
        let index = *counter;
        *counter += 1;

        let provider = match rule.role {
            LayoutRole::Boundary => facts.provider(),
            LayoutRole::Lane | LayoutRole::Section => None,
        };
        let info = LayoutInfo {
            role: rule.role,
            index,
            badge_label: badge_label(&facts),
            provider,
        };
        tracing::debug!(
            group = %group.id,
            role = rule.role.as_str(),
            rule = rule.name,
            index,
            "classified group"
        );
        infos.insert(group.id.clone(), info);
    }

    Classification { infos }
}

fn badge_label(facts: &GroupFacts) -> String {
    if let Some(token) = lane_token(facts.id, facts.label) {
        return token;
    }
    if let Some(token) = section_token(facts.id, facts.label) {
        return token;
    }
    let label = facts.label.trim();
    if label.is_empty() {
        facts.id.to_string()
    } else {
        label.to_string()
    }
}

fn has_role_keyword(id: &str) -> bool {
    let id = id.to_ascii_lowercase();
    id.starts_with("lane") || SECTION_KEYWORDS.iter().any(|kw| id.starts_with(kw))
}

fn looks_like_lane_or_section(id: &str, label: &str) -> bool {
    lane_token(id, label).is_some() || section_token(id, label).is_some() || has_role_keyword(id)
}

fn id_tokens(id: &str) -> impl Iterator<Item = &str> {
    id.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|token| !token.is_empty())
}

/// The first token of a label, if it is followed by a separator or ends
/// the label.
fn leading_label_token(label: &str) -> Option<&str> {
    let label = label.trim_start();
    let end = label
        .find(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | ':' | '.' | ')'))
        .unwrap_or(label.len());
    let token = &label[..end];
    (!token.is_empty()).then_some(token)
}

fn is_lane_token(token: &str) -> bool {
    let Some(last) = token.chars().last() else {
        return false;
    };
    let digits = &token[..token.len() - last.len_utf8()];
    last.is_ascii_alphabetic() && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_section_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// `1a`-style ordering token from the id or the start of the label.
pub fn lane_token(id: &str, label: &str) -> Option<String> {
    id_tokens(id)
        .find(|token| is_lane_token(token))
        .or_else(|| leading_label_token(label).filter(|token| is_lane_token(token)))
        .map(str::to_ascii_lowercase)
}

/// Bare numeric ordering token from the id or the start of the label.
pub fn section_token(id: &str, label: &str) -> Option<String> {
    id_tokens(id)
        .find(|token| is_section_token(token))
        .or_else(|| leading_label_token(label).filter(|token| is_section_token(token)))
        .map(str::to_string)
}

fn word_text(parts: &[&str]) -> String {
    let mut out = String::from(" ");
    for part in parts {
        for ch in part.chars() {
            if ch.is_alphanumeric() {
                out.extend(ch.to_lowercase());
            } else if !out.ends_with(' ') {
                out.push(' ');
            }
        }
        if !out.ends_with(' ') {
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_flowchart;

    fn classify(input: &str) -> Classification {
        let graph = parse_flowchart(input).unwrap().graph;
        classify_groups(&graph)
    }

    #[test]
    fn lane_and_section_from_tokens() {
        let classes = classify(
            "flowchart LR\nsubgraph path_1a[\"1a - Kafka\"]\nk[Kafka]-->c[Connector]\nend\nsubgraph section_2[\"2 - Ingest\"]\ns[Snowpipe]\nend",
        );
        assert_eq!(classes.len(), 2);
        let lane = classes.get("path_1a").unwrap();
        assert_eq!(lane.role, LayoutRole::Lane);
        assert_eq!(lane.badge_label, "1a");
        let section = classes.get("section_2").unwrap();
        assert_eq!(section.role, LayoutRole::Section);
        assert_eq!(section.badge_label, "2");
        assert!(classes.has_lane_metadata());
    }

    #[test]
    fn no_groups_means_no_metadata() {
        let classes = classify("flowchart LR\nA --> B");
        assert!(classes.is_empty());
        assert!(!classes.has_lane_metadata());
    }

    #[test]
    fn unmatched_groups_are_absent() {
        let classes = classify("flowchart LR\nsubgraph misc[\"Misc\"]\nA\nend");
        assert!(classes.get("misc").is_none());
        assert!(classes.is_empty());
    }

    #[test]
    fn indexes_are_per_role_in_document_order() {
        let classes = classify(
            "flowchart LR\nsubgraph lane_2b\nA\nend\nsubgraph section_1\nB\nend\nsubgraph lane_1a\nC\nend\nsubgraph stage_final\nD\nend",
        );
        let lanes: Vec<&str> = classes.lanes().iter().map(|(id, _)| *id).collect();
        assert_eq!(lanes, vec!["lane_2b", "lane_1a"]);
        let sections: Vec<(&str, usize)> = classes
            .sections()
            .iter()
            .map(|(id, info)| (*id, info.index))
            .collect();
        assert_eq!(sections, vec![("section_1", 0), ("stage_final", 1)]);
        assert_eq!(classes.get("stage_final").unwrap().badge_label, "stage_final");
    }

    #[test]
    fn boundary_beats_lane_and_section() {
        let classes = classify(
            "flowchart LR\nsubgraph snowflake[\"Snowflake Account\"]\nsubgraph section_2[\"2 - Ingest\"]\nA\nend\nend\nsubgraph lane_1a[\"1a - AWS Kinesis\"]\nB\nend",
        );
        let boundary = classes.get("snowflake").unwrap();
        assert_eq!(boundary.role, LayoutRole::Boundary);
        assert_eq!(boundary.provider, Some("snowflake"));
        assert_eq!(boundary.badge_label, "Snowflake Account");
        // An ordered lane that only mentions a provider stays a lane.
        assert_eq!(classes.get("lane_1a").unwrap().role, LayoutRole::Lane);
        assert_eq!(classes.get("section_2").unwrap().role, LayoutRole::Section);
    }

    #[test]
    fn outermost_group_of_sections_is_a_boundary() {
        let classes = classify(
            "flowchart LR\nsubgraph platform[\"Platform\"]\nsubgraph section_1\nA\nend\nend",
        );
        let info = classes.get("platform").unwrap();
        assert_eq!(info.role, LayoutRole::Boundary);
        assert_eq!(info.provider, None);
    }

    #[test]
    fn provider_words_match_whole_words_only() {
        let classes = classify("flowchart LR\nsubgraph laws[\"Laws\"]\nA\nend\nsubgraph g[\"Google Cloud\"]\nB\nend");
        assert!(classes.get("laws").is_none());
        assert_eq!(classes.get("g").unwrap().provider, Some("google_cloud"));
    }

    #[test]
    fn ordering_tokens() {
        assert_eq!(lane_token("path_1A", ""), Some("1a".to_string()));
        assert_eq!(lane_token("x", "3c: Batch"), Some("3c".to_string()));
        assert_eq!(lane_token("s3_bucket", "S3"), None);
        assert_eq!(section_token("x", "4 - Serve"), Some("4".to_string()));
        assert_eq!(section_token("x", "42nd street"), None);
    }
}
