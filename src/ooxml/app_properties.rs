//! Títulos de hojas en `docProps/app.xml`.
//!
//! `TitlesOfParts` enumera los nombres de las hojas y `HeadingPairs` los
//! agrupa en segmentos (nombre, cantidad). Si una hoja se elimina y su título
//! queda aquí, el nombre sigue filtrándose en las propiedades del documento.

use std::collections::BTreeSet;

use xmltree::{Element, XMLNode};

use crate::constants::APP_PROPERTIES_PART;
use crate::error::{Result, SanitizeError};
use crate::xml::{element_text_content, parse_element};

/// Quita de las propiedades extendidas los títulos de las hojas indicadas.
/// Devuelve `None` si no había nada que quitar.
pub fn remove_sheet_titles(bytes: &[u8], names: &[String]) -> Result<Option<Vec<u8>>> {
    if names.is_empty() {
        return Ok(None);
    }
    let mut root = parse_element(APP_PROPERTIES_PART, bytes)?;

    let Some(titles) = vector(&root, "TitlesOfParts").map(element_children_text) else {
        return Ok(None);
    };
    let Some(segments) = vector(&root, "HeadingPairs").map(heading_segments) else {
        return Ok(None);
    };
    // Si los segmentos no cubren exactamente los títulos no se toca nada.
    if segments.iter().map(|(_, count)| count).sum::<usize>() != titles.len() {
        return Ok(None);
    }

    let mut pending: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut dropped = BTreeSet::new();
    let mut new_counts = Vec::with_capacity(segments.len());
    let mut offset = 0;
    for (_, count) in &segments {
        let mut kept = *count;
        for (index, title) in titles.iter().enumerate().skip(offset).take(*count) {
            if let Some(position) = pending.iter().position(|name| *name == title.as_str()) {
                pending.remove(position);
                dropped.insert(index);
                kept -= 1;
            }
        }
        new_counts.push(kept);
        offset += count;
    }
    if dropped.is_empty() {
        return Ok(None);
    }

    if let Some(titles) = vector_mut(&mut root, "TitlesOfParts") {
        let mut index = 0;
        titles.children.retain(|node| match node {
            XMLNode::Element(_) => {
                let keep = !dropped.contains(&index);
                index += 1;
                keep
            }
            _ => true,
        });
        let size = index - dropped.len();
        titles.attributes.insert("size".to_string(), size.to_string());
    }

    if let Some(headings) = vector_mut(&mut root, "HeadingPairs") {
        rewrite_headings(headings, &new_counts);
    }

    let mut output = Vec::new();
    let mut config = xmltree::EmitterConfig::new();
    config.perform_indent = false;
    config.write_document_declaration = true;
    root.write_with_config(&mut output, config)
        .map_err(|e| SanitizeError::malformed_part(APP_PROPERTIES_PART, e))?;
    Ok(Some(output))
}

fn vector<'a>(root: &'a Element, container: &str) -> Option<&'a Element> {
    root.get_child(container)?.get_child("vector")
}

fn vector_mut<'a>(root: &'a mut Element, container: &str) -> Option<&'a mut Element> {
    root.get_mut_child(container)?.get_mut_child("vector")
}

fn element_children(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(|node| match node {
        XMLNode::Element(child) => Some(child),
        _ => None,
    })
}

fn element_children_text(vector: &Element) -> Vec<String> {
    element_children(vector).map(element_text_content).collect()
}

/// Pares (nombre del segmento, cantidad) de `HeadingPairs`.
fn heading_segments(vector: &Element) -> Vec<(String, usize)> {
    let values: Vec<String> = element_children(vector)
        .map(|variant| element_children(variant).next().map(element_text_content).unwrap_or_default())
        .collect();
    values
        .chunks(2)
        .filter_map(|pair| match pair {
            [name, count] => Some((name.clone(), count.parse().unwrap_or(0))),
            _ => None,
        })
        .collect()
}

/// Actualiza las cantidades y elimina los segmentos que quedaron vacíos.
fn rewrite_headings(vector: &mut Element, new_counts: &[usize]) {
    let mut variant_index = 0;
    let mut kept_variants = 0;
    vector.children.retain_mut(|node| {
        let XMLNode::Element(variant) = node else {
            return true;
        };
        let segment = variant_index / 2;
        let is_count = variant_index % 2 == 1;
        variant_index += 1;

        let count = new_counts.get(segment).copied().unwrap_or(1);
        if count == 0 {
            return false;
        }
        if is_count
            && let Some(XMLNode::Element(value)) = variant
                .children
                .iter_mut()
                .find(|child| matches!(child, XMLNode::Element(_)))
        {
            value.children = vec![XMLNode::Text(count.to_string())];
        }
        kept_variants += 1;
        true
    });
    vector
        .attributes
        .insert("size".to_string(), kept_variants.to_string());
}
