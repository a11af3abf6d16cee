//! HTML parsing for herbarium pages
//!
//! This module extracts:
//! - Species links from the species listing
//! - Base fields and the section menu from a species index page
//! - Text, HTML and captioned images from content pages
//! - Structured nomenclature and the combined ecology/distribution page

use crate::catalog::FragmentKind;
use crate::crawler::source::Discovery;
use crate::state::{
    BaseFields, BasicInfo, CaptionedImage, CollectionMetadata, EntityId, FragmentContent,
    GpsCoordinates, Nomenclature, SectionContent, SpecimenImages,
};
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use url::Url;

/// Menu entries on the index page, by menu kind and title
const MENU_ENTRIES: [(&str, &str, FragmentKind); 17] = [
    ("plant_menu", "Nomenclature", FragmentKind::Nomenclature),
    ("plant_sousmenu", "Habit", FragmentKind::Habit),
    ("plant_sousmenu", "Leaf", FragmentKind::Leaf),
    ("plant_sousmenu", "Flower", FragmentKind::Flower),
    ("plant_sousmenu", "Fruit", FragmentKind::Fruit),
    ("plant_sousmenu", "Seed", FragmentKind::Seed),
    ("plant_sousmenu", "Stem", FragmentKind::StemBark),
    ("plant_menu", "Phenology", FragmentKind::Phenology),
    ("plant_menu", "Reproduction", FragmentKind::ReproductionDispersal),
    ("plant_menu", "Ecology", FragmentKind::Distribution),
    ("plant_sousmenu", "Medicinal", FragmentKind::Medicinal),
    ("plant_sousmenu", "Culinary", FragmentKind::Culinary),
    ("plant_sousmenu", "Handicrafts", FragmentKind::Handicrafts),
    ("plant_sousmenu", "Veterinary", FragmentKind::Veterinary),
    ("plant_sousmenu", "Others", FragmentKind::Others),
    ("plant_menu", "Conservation status", FragmentKind::ConservationStatus),
    ("plant_menu", "Reforestation", FragmentKind::Reforestation),
];

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Text of the first element matching `css`, trimmed; None if absent or blank
fn select_text(root: ElementRef<'_>, css: &str) -> Option<String> {
    let selector = selector(css)?;
    root.select(&selector)
        .next()
        .map(|element| element.text().collect::<String>())
        .and_then(non_empty)
}

/// Direct child text of an element, ignoring nested elements
fn own_text(element: ElementRef<'_>) -> Option<String> {
    let text: Vec<&str> = element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .collect();
    non_empty(text.join(" "))
}

fn select_attr(root: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    let selector = selector(css)?;
    root.select(&selector)
        .find_map(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Text fragments of an element, trimmed and skipping blanks
fn text_parts(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(String::from)
        .collect()
}

/// Text nodes under `element` whose parent is not a `<span>` label
fn text_outside_spans(element: ElementRef<'_>) -> Vec<String> {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let in_span = node
                .parent()
                .and_then(|parent| parent.value().as_element().map(|e| e.name() == "span"))
                .unwrap_or(false);
            if in_span {
                return None;
            }
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

/// First following sibling element with the given id
fn next_sibling_with_id<'a>(element: ElementRef<'a>, id: &str) -> Option<ElementRef<'a>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().id() == Some(id))
}

/// Extracts the species ids linked from the species listing, in document order
///
/// Only `herbarium.php?id=N` links count; duplicates are dropped.
pub fn parse_species_links(html: &str, base_url: &Url) -> Vec<EntityId> {
    let document = Html::parse_document(html);
    let Some(a_selector) = selector("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for element in document.select(&a_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(url) = base_url.join(href.trim()) else {
            continue;
        };
        if !url.path().ends_with("herbarium.php") {
            continue;
        }

        let id = url
            .query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()));

        if let Some(id) = id {
            if seen.insert(id.clone()) {
                ids.push(EntityId::new(id));
            }
        }
    }

    ids
}

/// Parses a species index page into base fields and the advertised fragment kinds
pub fn parse_index_page(html: &str, url: &str, scraped_at: String) -> Discovery {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let base = BaseFields {
        url: url.to_string(),
        scraped_at,
        basic_info: parse_basic_info(root),
        images: SpecimenImages {
            main_specimen: select_attr(root, "div#specimen_wrapper div#specimen_img img", "src"),
            dry_herbarium: select_attr(root, "div#dryherbarium-img img", "src"),
        },
        collection_metadata: parse_collection_metadata(root),
    };

    Discovery {
        base,
        available: parse_menu(root),
    }
}

fn parse_basic_info(root: ElementRef<'_>) -> BasicInfo {
    let title = selector("div#specimen_title").and_then(|s| root.select(&s).next());

    BasicInfo {
        scientific_name: title.and_then(own_text),
        authority: select_text(root, "div#specimen_title span.specimen_title2"),
        family: selector("div#specimen_family")
            .and_then(|s| root.select(&s).next())
            .and_then(own_text),
    }
}

fn parse_collection_metadata(root: ElementRef<'_>) -> CollectionMetadata {
    let mut metadata = CollectionMetadata::default();
    let Some(title_selector) = selector("div#notes_title") else {
        return metadata;
    };

    for title in root.select(&title_selector) {
        let label = title.text().collect::<String>();
        let Some(content) = next_sibling_with_id(title, "notes_content") else {
            continue;
        };

        if label.contains("Date of collection") {
            metadata.date = own_text(content);
        } else if label.contains("Collected by") {
            metadata.collected_by = own_text(content);
        } else if label.contains("Locality") {
            metadata.locality = own_text(content);
        } else if label.contains("GPS") {
            metadata.gps_coordinates = select_text(content, "pre")
                .or_else(|| own_text(content))
                .map(|raw| GpsCoordinates::parse(&raw));
        }
    }

    metadata
}

/// Reads the side menu; None if the page has no menu at all
fn parse_menu(root: ElementRef<'_>) -> Option<BTreeSet<FragmentKind>> {
    let any_menu = selector("div#plant_menu, div#plant_sousmenu")?;
    root.select(&any_menu).next()?;

    let mut available = BTreeSet::new();
    for (menu, title, kind) in MENU_ENTRIES {
        // The Ecology entry is never a link when it is the current page
        let css = match kind {
            FragmentKind::Distribution => format!("div#{menu}[title=\"{title}\"]"),
            _ => format!(
                "div#{menu}[title=\"{title}\"] a, div#{menu}[title=\"{title}\"] span.subselected"
            ),
        };

        if let Some(entry) = selector(&css) {
            if root.select(&entry).next().is_some() {
                available.insert(kind);
            }
        }
    }

    Some(available)
}

/// Parses the page serving `kind` into fragment content
pub fn parse_fragment(kind: FragmentKind, html: &str) -> FragmentContent {
    let document = Html::parse_document(html);
    let root = document.root_element();

    match kind {
        FragmentKind::Nomenclature => FragmentContent::Nomenclature(parse_nomenclature(root)),
        FragmentKind::Distribution => FragmentContent::EcologyDistribution {
            ecology: parse_titled_chapter(root, "Ecology"),
            distribution: parse_titled_chapter(root, "Distribution"),
        },
        _ => FragmentContent::Section(parse_content_section(root)),
    }
}

/// Generic content page: `div#plant_txt` plus captioned specimen images
fn parse_content_section(root: ElementRef<'_>) -> SectionContent {
    let text_element = selector("div#plant_txt").and_then(|s| root.select(&s).next());

    let text = selector("div#plant_txt p").and_then(|paragraphs| {
        let parts: Vec<String> = root.select(&paragraphs).flat_map(text_parts).collect();
        non_empty(parts.join(" "))
    });

    SectionContent {
        text,
        text_html: text_element.map(|element| element.html()),
        images: parse_captioned_images(root),
    }
}

fn parse_captioned_images(root: ElementRef<'_>) -> Vec<CaptionedImage> {
    let (Some(img_divs), Some(img)) = (selector("div#specimen_img"), selector("img")) else {
        return Vec::new();
    };

    root.select(&img_divs)
        .filter_map(|div| {
            let url = div
                .select(&img)
                .find_map(|element| element.value().attr("src"))?
                .trim()
                .to_string();
            let caption = next_sibling_with_id(div, "specimen_legend").and_then(own_text);
            Some(CaptionedImage { url, caption })
        })
        .collect()
}

/// One `<span class="titchap">Title :</span>` chapter of the ecology page
fn parse_titled_chapter(root: ElementRef<'_>, title: &str) -> SectionContent {
    let Some(titles) = selector("span.titchap") else {
        return SectionContent::default();
    };
    let Some(heading) = root
        .select(&titles)
        .find(|span| span.text().collect::<String>().contains(title))
    else {
        return SectionContent::default();
    };

    let parts: Vec<String> = heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| sibling.value().name() == "p")
        .flat_map(text_parts)
        .collect();

    let text_html = heading
        .parent()
        .and_then(ElementRef::wrap)
        .filter(|parent| parent.value().name() == "li")
        .map(|parent| parent.html());

    SectionContent {
        text: non_empty(parts.join(" ")),
        text_html,
        images: Vec::new(),
    }
}

/// Nomenclature page: a list of labelled `<li>` entries
fn parse_nomenclature(root: ElementRef<'_>) -> Nomenclature {
    let Some(items) = selector("li") else {
        return Nomenclature::default();
    };
    let entries: Vec<ElementRef<'_>> = root.select(&items).collect();

    let botanical_name = labelled(&entries, "Botanical name").find_map(|li| select_text(li, "em"));

    let author = labelled(&entries, "Author").find_map(|li| {
        li.children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "p")
            .find_map(own_text)
    });

    let family = unlabelled_text(&entries, "Family");
    let english_names = unlabelled_text(&entries, "English names");
    let indian_names = unlabelled_text(&entries, "Indian names")
        .map(|text| parse_indian_names(&text))
        .filter(|names| !names.is_empty());

    let synonyms = labelled(&entries, "Synonyms")
        .next()
        .and_then(|li| {
            let italics = selector("p i")?;
            Some(
                li.select(&italics)
                    .filter_map(|i| non_empty(i.text().collect()))
                    .collect::<Vec<_>>(),
            )
        })
        .unwrap_or_default();

    let etymology_paragraph = labelled(&entries, "Etymology")
        .next()
        .and_then(|li| selector("p").and_then(|p| li.select(&p).next()));

    Nomenclature {
        botanical_name,
        author,
        family,
        english_names,
        indian_names,
        synonyms,
        etymology: etymology_paragraph.and_then(|p| non_empty(text_parts(p).join("\n"))),
        etymology_html: etymology_paragraph.map(|p| p.html()),
    }
}

/// List entries whose text mentions `label`
fn labelled<'a, 'b>(
    entries: &'b [ElementRef<'a>],
    label: &'b str,
) -> impl Iterator<Item = ElementRef<'a>> + 'b {
    entries
        .iter()
        .copied()
        .filter(move |li| li.text().any(|text| text.contains(label)))
}

/// Text of the first entry for `label`, minus the label itself
fn unlabelled_text(entries: &[ElementRef<'_>], label: &str) -> Option<String> {
    let li = labelled(entries, label).next()?;
    let parts: Vec<String> = text_outside_spans(li)
        .into_iter()
        .filter(|text| !text.contains(label))
        .collect();
    non_empty(parts.join(" "))
}

/// Splits "Hindi : Peeli kaner Tamil : Arali, ponnarali" into names per language
fn parse_indian_names(text: &str) -> BTreeMap<String, Vec<String>> {
    let segments: Vec<&str> = text.split(':').collect();
    let mut names = BTreeMap::new();
    if segments.len() < 2 {
        return names;
    }

    let mut language = segments[0].split_whitespace().last();

    for (index, segment) in segments.iter().enumerate().skip(1) {
        let mut words: Vec<&str> = segment.split_whitespace().collect();
        let next_language = if index + 1 < segments.len() {
            words.pop()
        } else {
            None
        };

        if let Some(lang) = language.filter(|lang| is_language_name(lang)) {
            let list: Vec<String> = words
                .join(" ")
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect();
            if !list.is_empty() {
                names.insert(lang.to_string(), list);
            }
        }

        language = next_language;
    }

    names
}

fn is_language_name(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {
            let rest: Vec<char> = chars.collect();
            !rest.is_empty() && rest.iter().all(|c| c.is_ascii_lowercase())
        }
        _ => false,
    }
}
