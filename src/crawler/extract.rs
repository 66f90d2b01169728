//! Detail page extraction
//!
//! Pure functions over a rendered detail page. Nothing here fails: a field
//! that cannot be found falls back to its default.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use super::{CatalogItem, ProductRecord, UNKNOWN_NAME};

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)minutes\s*=\s*(\d+)").expect("valid duration regex"));

static TEST_TYPE_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Test Type:").expect("valid label regex"));

static REMOTE_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Remote Testing:").expect("valid label regex"));

/// Assessment category, keyed by the single-letter code used on the site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestType {
    AbilityAptitude,
    BiodataSituationalJudgement,
    Competencies,
    Development360,
    AssessmentExercises,
    KnowledgeSkills,
    PersonalityBehaviour,
    Simulations,
}

impl TestType {
    pub const ALL: [TestType; 8] = [
        TestType::AbilityAptitude,
        TestType::BiodataSituationalJudgement,
        TestType::Competencies,
        TestType::Development360,
        TestType::AssessmentExercises,
        TestType::KnowledgeSkills,
        TestType::PersonalityBehaviour,
        TestType::Simulations,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn code(&self) -> &'static str {
        match self {
            TestType::AbilityAptitude => "A",
            TestType::BiodataSituationalJudgement => "B",
            TestType::Competencies => "C",
            TestType::Development360 => "D",
            TestType::AssessmentExercises => "E",
            TestType::KnowledgeSkills => "K",
            TestType::PersonalityBehaviour => "P",
            TestType::Simulations => "S",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TestType::AbilityAptitude => "Ability & Aptitude",
            TestType::BiodataSituationalJudgement => "Biodata & Situational Judgement",
            TestType::Competencies => "Competencies",
            TestType::Development360 => "Development & 360",
            TestType::AssessmentExercises => "Assessment Exercises",
            TestType::KnowledgeSkills => "Knowledge & Skills",
            TestType::PersonalityBehaviour => "Personality & Behaviour",
            TestType::Simulations => "Simulations",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map category codes to labels, keeping order; unknown codes pass through
pub fn map_test_types<I, S>(codes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    codes
        .into_iter()
        .map(|code| {
            let code = code.as_ref();
            TestType::from_code(code)
                .map(|t| t.label().to_string())
                .unwrap_or_else(|| code.to_string())
        })
        .collect()
}

/// Keep at most `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Whether a fetched page is a gateway or error page rather than a product
pub fn is_error_page(title: &str, html: &str) -> bool {
    let title = title.to_lowercase();
    if title.contains("504") || title.contains("error") {
        return true;
    }

    let document = Html::parse_document(html);
    let heading = first_heading(&document).unwrap_or_default().to_lowercase();
    heading.contains("bad gateway") || heading.contains("error")
}

/// Extract a product record from a detail page
pub fn extract_product(html: &str, item: &CatalogItem, description_max_chars: usize) -> ProductRecord {
    let document = Html::parse_document(html);

    let name = first_heading(&document).unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let description = section_text(&document, "Description")
        .map(|text| truncate_chars(&text, description_max_chars))
        .unwrap_or_default();

    ProductRecord {
        name,
        url: item.url.clone(),
        description,
        duration: extract_duration(&document),
        adaptive_support: item.adaptive_support,
        remote_support: extract_remote_support(&document),
        test_type: extract_test_types(&document),
        job_levels: section_text(&document, "Job levels"),
        languages: section_text(&document, "Languages"),
    }
}

fn first_heading(document: &Html) -> Option<String> {
    let selector = Selector::parse("h1").ok()?;
    document.select(&selector).next().map(|h1| joined_text(h1, ""))
}

/// Text nodes trimmed, empty ones dropped, joined with `separator`
fn joined_text(element: ElementRef<'_>, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// All text of `element` with whitespace runs collapsed to single spaces
fn normalized_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the section introduced by an `h4` containing `label`, ignoring case
fn section_text(document: &Html, label: &str) -> Option<String> {
    let selector = Selector::parse("h4").ok()?;
    let needle = label.to_lowercase();
    let heading = document
        .select(&selector)
        .find(|h4| h4.text().collect::<String>().to_lowercase().contains(&needle))?;

    if let Some(paragraph) = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "p")
    {
        return Some(normalized_text(paragraph));
    }

    let label_re = Regex::new(&format!("(?i){}", regex::escape(label))).ok()?;
    nearest_ancestor(heading, &["div"]).map(|div| {
        let text = normalized_text(div);
        normalized_whitespace(&label_re.replace_all(&text, ""))
    })
}

fn normalized_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `element` itself or its closest ancestor named after the first matching entry of `names`
fn nearest_ancestor<'a>(element: ElementRef<'a>, names: &[&str]) -> Option<ElementRef<'a>> {
    names.iter().find_map(|name| {
        std::iter::once(element)
            .chain(element.ancestors().filter_map(ElementRef::wrap))
            .find(|el| el.value().name() == *name)
    })
}

/// Container of the first text node matching `label`, preferring a `p`
fn labelled_container<'a>(document: &'a Html, label: &Regex) -> Option<ElementRef<'a>> {
    let text_node = document
        .tree
        .root()
        .descendants()
        .find(|node| matches!(node.value(), Node::Text(text) if label.is_match(text)))?;
    let parent = text_node.parent().and_then(ElementRef::wrap)?;
    nearest_ancestor(parent, &["p", "div"])
}

fn extract_test_types(document: &Html) -> Vec<String> {
    let Some(container) = labelled_container(document, &TEST_TYPE_LABEL_RE) else {
        return Vec::new();
    };
    let Ok(keys) = Selector::parse("span.product-catalogue__key") else {
        return Vec::new();
    };

    map_test_types(container.select(&keys).map(|span| joined_text(span, "")))
}

fn extract_remote_support(document: &Html) -> bool {
    let Some(container) = labelled_container(document, &REMOTE_LABEL_RE) else {
        return false;
    };
    let Ok(spans) = Selector::parse("span[class]") else {
        return false;
    };

    container
        .select(&spans)
        .filter_map(|span| span.value().attr("class"))
        .find(|class| class.contains("catalogue__circle"))
        .is_some_and(|class| class.contains("-yes"))
}

fn extract_duration(document: &Html) -> Option<u32> {
    let text = visible_text(document);
    DURATION_RE
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Page text outside `script` and `style`, text nodes joined by spaces
fn visible_text(document: &Html) -> String {
    document
        .tree
        .root()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => {
                let hidden = node
                    .parent()
                    .and_then(ElementRef::wrap)
                    .is_some_and(|parent| matches!(parent.value().name(), "script" | "style"));
                (!hidden).then(|| text.trim())
            }
            _ => None,
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
