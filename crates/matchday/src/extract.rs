use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static SEL_ITEM: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".match-item, .game-item, tr.match").expect("invalid selector: item")
});
static SEL_TABLE_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tr").expect("invalid selector: table row"));
static SEL_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("invalid selector: cell"));
static SEL_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("invalid selector: link"));

static SEL_ROUND: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".round, .section").expect("invalid selector: round"));
static SEL_DATE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".date, .match-date").expect("invalid selector: date"));
static SEL_HOME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".home-team").expect("invalid selector: home team"));
static SEL_AWAY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".away-team").expect("invalid selector: away team"));
static SEL_SCORE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".score").expect("invalid selector: score"));
static SEL_LOCATION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".location, .home-away").expect("invalid selector: location")
});
static SEL_STADIUM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".venue, .stadium").expect("invalid selector: stadium"));
static SEL_COMPETITION: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".competition, .tournament").expect("invalid selector: competition")
});

/// Minimum number of `td` cells in a table row that describes a match:
/// round, date, card, location, stadium.
const MIN_TABLE_CELLS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowLayout {
    /// Positional `td` cells of a schedule table.
    #[default]
    Table,
    /// A block whose fields are tagged with classes.
    Item,
}

/// The text fragments of one schedule row, before any interpretation.
///
/// Table rows fill `card` (teams and score in one cell); item blocks fill
/// `home_team`, `away_team` and `score` separately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub index: usize,
    pub layout: RowLayout,
    pub round: Option<String>,
    pub date: Option<String>,
    pub card: Option<String>,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub score: Option<String>,
    pub location: Option<String>,
    pub stadium: Option<String>,
    pub competition: Option<String>,
    pub href: Option<String>,
}

pub trait RowExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Vec<RawRow>;
}

/// Tries class-tagged item blocks first, then falls back to plain table rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorExtractor;

impl RowExtractor for SelectorExtractor {
    fn extract(&self, html: &str) -> Vec<RawRow> {
        let document = Html::parse_document(html);

        let items = extract_items(&document);
        if !items.is_empty() {
            log::debug!("Found {} item block(s)", items.len());
            return items;
        }

        let rows = extract_table_rows(&document);
        if rows.is_empty() {
            log::warn!("No schedule rows found; page layout may have changed");
        } else {
            log::debug!("Found {} table row(s)", rows.len());
        }
        rows
    }
}

pub(crate) fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cell_text(element: ElementRef) -> Option<String> {
    Some(normalize_whitespace(&elem_text(element))).filter(|s| !s.is_empty())
}

fn first_text(element: ElementRef, selector: &Selector) -> Option<String> {
    element.select(selector).next().and_then(cell_text)
}

fn first_href(element: ElementRef) -> Option<String> {
    element
        .select(&SEL_LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}

fn extract_table_rows(document: &Html) -> Vec<RawRow> {
    document
        .select(&SEL_TABLE_ROW)
        .filter_map(|row| {
            let cells: Vec<ElementRef> = row.select(&SEL_CELL).collect();
            if cells.len() < MIN_TABLE_CELLS {
                return None;
            }
            Some(cells)
        })
        .enumerate()
        .map(|(index, cells)| RawRow {
            index,
            layout: RowLayout::Table,
            round: cell_text(cells[0]),
            date: cell_text(cells[1]),
            card: cell_text(cells[2]),
            location: cell_text(cells[3]),
            stadium: cell_text(cells[4]),
            competition: cells.get(5).copied().and_then(cell_text),
            href: first_href(cells[2]),
            ..Default::default()
        })
        .collect()
}

fn extract_items(document: &Html) -> Vec<RawRow> {
    document
        .select(&SEL_ITEM)
        .enumerate()
        .map(|(index, item)| RawRow {
            index,
            layout: RowLayout::Item,
            round: first_text(item, &SEL_ROUND),
            date: first_text(item, &SEL_DATE),
            card: None,
            home_team: first_text(item, &SEL_HOME),
            away_team: first_text(item, &SEL_AWAY),
            score: first_text(item, &SEL_SCORE),
            location: first_text(item, &SEL_LOCATION),
            stadium: first_text(item, &SEL_STADIUM),
            competition: first_text(item, &SEL_COMPETITION),
            href: first_href(item),
        })
        .collect()
}
