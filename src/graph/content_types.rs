//! Declaraciones de `[Content_Types].xml`.

use std::collections::{BTreeMap, BTreeSet};

use quick_xml::events::BytesStart;

use crate::archive::Archive;
use crate::constants::CONTENT_TYPES_PART;
use crate::error::{Result, SanitizeError};
use crate::paths;
use crate::xml::{self, Action, AttrEdit, XmlRewrite, children_named, parse_element};

#[derive(Clone, Debug, Default)]
pub struct ContentTypes {
    defaults: Vec<(String, String)>,
    /// Pares (nombre de parte normalizado, tipo de contenido).
    overrides: Vec<(String, String)>,
    removed_overrides: BTreeSet<String>,
    removed_defaults: BTreeSet<String>,
    retyped: BTreeMap<String, String>,
}

impl ContentTypes {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        let root = parse_element(CONTENT_TYPES_PART, bytes)?;
        let mut content_types = ContentTypes::default();

        for node in children_named(&root, "Default") {
            if let (Some(ext), Some(ct)) =
                (node.attributes.get("Extension"), node.attributes.get("ContentType"))
            {
                content_types
                    .defaults
                    .push((ext.to_ascii_lowercase(), ct.clone()));
            }
        }
        for node in children_named(&root, "Override") {
            if let (Some(part), Some(ct)) =
                (node.attributes.get("PartName"), node.attributes.get("ContentType"))
            {
                content_types
                    .overrides
                    .push((paths::normalize(part), ct.clone()));
            }
        }

        Ok(content_types)
    }

    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides
            .iter()
            .map(|(part, ct)| (part.as_str(), ct.as_str()))
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defaults.iter().map(|(ext, ct)| (ext.as_str(), ct.as_str()))
    }

    /// Tipo efectivo: primero `Override`, luego `Default` por extensión.
    pub fn content_type_of(&self, part: &str) -> Option<&str> {
        if let Some((_, ct)) = self
            .overrides
            .iter()
            .find(|(name, _)| paths::same_part(name, part))
        {
            return Some(ct.as_str());
        }
        let ext = paths::extension_of(part)?.to_ascii_lowercase();
        self.defaults
            .iter()
            .find(|(default_ext, _)| *default_ext == ext)
            .map(|(_, ct)| ct.as_str())
    }

    /// Partes declaradas con alguno de los tipos indicados.
    pub fn parts_with_content_type(&self, content_types: &[&str]) -> Vec<String> {
        self.overrides
            .iter()
            .filter(|(_, ct)| content_types.iter().any(|wanted| ct.eq_ignore_ascii_case(wanted)))
            .map(|(part, _)| part.clone())
            .collect()
    }

    pub(crate) fn remove_override(&mut self, part: &str) -> bool {
        let Some(index) = self
            .overrides
            .iter()
            .position(|(name, _)| paths::same_part(name, part))
        else {
            return false;
        };
        let (name, _) = self.overrides.remove(index);
        self.retyped.remove(&name);
        self.removed_overrides.insert(name.to_ascii_lowercase());
        true
    }

    /// Cambia el tipo declarado de una parte existente.
    pub(crate) fn set_override(&mut self, part: &str, content_type: &str) -> bool {
        let Some((name, current)) = self
            .overrides
            .iter_mut()
            .find(|(name, _)| paths::same_part(name, part))
        else {
            return false;
        };
        if current == content_type {
            return false;
        }
        *current = content_type.to_string();
        self.retyped.insert(name.clone(), content_type.to_string());
        true
    }

    /// Quita las declaraciones `Default` cuyo tipo esté en la lista.
    pub(crate) fn remove_defaults_of_type(&mut self, content_types: &[&str]) -> usize {
        let before = self.defaults.len();
        let removed = &mut self.removed_defaults;
        self.defaults.retain(|(ext, ct)| {
            let drop = content_types.iter().any(|wanted| ct.eq_ignore_ascii_case(wanted));
            if drop {
                removed.insert(ext.clone());
            }
            !drop
        });
        before - self.defaults.len()
    }

    pub(crate) fn validate(&self, archive: &Archive) -> Result<()> {
        for (part, _) in &self.overrides {
            if !archive.contains(part) {
                return Err(SanitizeError::malformed_relationship(
                    CONTENT_TYPES_PART,
                    format!("se declara `/{part}`, que no existe"),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn is_dirty(&self) -> bool {
        !self.removed_overrides.is_empty()
            || !self.removed_defaults.is_empty()
            || !self.retyped.is_empty()
    }

    pub(crate) fn flush(&mut self, archive: &mut Archive) -> Result<()> {
        let Some(current) = archive.get(CONTENT_TYPES_PART).map(<[u8]>::to_vec) else {
            return Err(SanitizeError::malformed_part(
                CONTENT_TYPES_PART,
                "la declaración de tipos desapareció",
            ));
        };
        let mut rewriter = ContentTypesRewriter { types: self };
        let (updated, changed) = xml::rewrite_xml(CONTENT_TYPES_PART, &current, &mut rewriter)?;
        if changed {
            archive.replace(CONTENT_TYPES_PART, updated);
        }
        self.removed_overrides.clear();
        self.removed_defaults.clear();
        self.retyped.clear();
        Ok(())
    }
}

struct ContentTypesRewriter<'a> {
    types: &'a ContentTypes,
}

impl XmlRewrite for ContentTypesRewriter<'_> {
    fn start(&mut self, _path: &[String], element: &BytesStart<'_>) -> Result<Action> {
        match xml::local_name(element).as_str() {
            "Override" => {
                let Some(part) = xml::attr(element, "PartName").map(|p| paths::normalize(&p))
                else {
                    return Ok(Action::Keep);
                };
                if self
                    .types
                    .removed_overrides
                    .contains(&part.to_ascii_lowercase())
                {
                    return Ok(Action::Remove);
                }
                let retyped = self
                    .types
                    .retyped
                    .iter()
                    .find(|(name, _)| paths::same_part(name, &part))
                    .map(|(_, ct)| ct.clone());
                match retyped {
                    Some(new_type) => {
                        let rebuilt = xml::edit_attributes(element, |local, _| match local {
                            "ContentType" => AttrEdit::Set(new_type.clone()),
                            _ => AttrEdit::Keep,
                        });
                        Ok(rebuilt.map_or(Action::Keep, Action::Replace))
                    }
                    None => Ok(Action::Keep),
                }
            }
            "Default" => match xml::attr(element, "Extension") {
                Some(ext) if self.types.removed_defaults.contains(&ext.to_ascii_lowercase()) => {
                    Ok(Action::Remove)
                }
                _ => Ok(Action::Keep),
            },
            _ => Ok(Action::Keep),
        }
    }
}
