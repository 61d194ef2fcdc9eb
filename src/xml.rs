//! Utilidades XML compartidas.
//!
//! La lectura estructurada usa `xmltree`; la reescritura de partes se hace en
//! streaming con `quick-xml` para que todo lo que no se toca salga tal cual.

use std::borrow::Cow;
use std::io::Cursor;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use xmltree::{Element, XMLNode};

use crate::error::{Result, SanitizeError};

/// Decisión sobre un elemento durante la reescritura.
pub(crate) enum Action {
    Keep,
    /// Descarta el elemento y todo su contenido.
    Remove,
    Replace(BytesStart<'static>),
}

/// Ganchos invocados por [`rewrite_xml`]. `path` contiene los nombres locales
/// de los ancestros del elemento actual.
pub(crate) trait XmlRewrite {
    fn start(&mut self, path: &[String], element: &BytesStart<'_>) -> Result<Action>;

    /// Se llama al cerrar cualquier elemento conservado.
    fn end(&mut self, _path: &[String], _local_name: &str) {}

    /// Permite sustituir el texto de un nodo.
    fn text(&mut self, _path: &[String], _text: &str) -> Option<String> {
        None
    }

    /// Eventos que se insertan justo antes del cierre de un elemento (`path` lo incluye).
    fn closing(&mut self, _path: &[String], _local_name: &str) -> Vec<Event<'static>> {
        Vec::new()
    }
}

/// Reescribe `input` aplicando `rewriter`. Devuelve los bytes nuevos y si hubo cambios.
pub(crate) fn rewrite_xml<R: XmlRewrite>(
    part: &str,
    input: &[u8],
    rewriter: &mut R,
) -> Result<(Vec<u8>, bool)> {
    let mut reader = Reader::from_reader(input);
    let mut writer = Writer::new(Vec::with_capacity(input.len()));
    let mut path: Vec<String> = Vec::new();
    let mut changed = false;
    let mut skip_depth = 0_usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| SanitizeError::malformed_part(part, e))?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => {
                    return Err(SanitizeError::malformed_part(
                        part,
                        "fin inesperado del documento XML",
                    ));
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(element) => {
                let local = local_name(&element);
                match rewriter.start(&path, &element)? {
                    Action::Remove => {
                        changed = true;
                        skip_depth = 1;
                    }
                    Action::Keep => {
                        write(&mut writer, part, Event::Start(element))?;
                        path.push(local);
                    }
                    Action::Replace(replacement) => {
                        changed = true;
                        write(&mut writer, part, Event::Start(replacement))?;
                        path.push(local);
                    }
                }
            }
            Event::Empty(element) => {
                let local = local_name(&element);
                let element: BytesStart<'_> = match rewriter.start(&path, &element)? {
                    Action::Remove => {
                        changed = true;
                        continue;
                    }
                    Action::Keep => element,
                    Action::Replace(replacement) => {
                        changed = true;
                        replacement
                    }
                };

                path.push(local.clone());
                let extra = rewriter.closing(&path, &local);
                path.pop();

                if extra.is_empty() {
                    write(&mut writer, part, Event::Empty(element))?;
                } else {
                    changed = true;
                    let end = element.to_end().into_owned();
                    write(&mut writer, part, Event::Start(element))?;
                    for event in extra {
                        write(&mut writer, part, event)?;
                    }
                    write(&mut writer, part, Event::End(end))?;
                }
                rewriter.end(&path, &local);
            }
            Event::End(element) => {
                let extra = match path.last().cloned() {
                    Some(local) => rewriter.closing(&path, &local),
                    None => Vec::new(),
                };
                if !extra.is_empty() {
                    changed = true;
                    for event in extra {
                        write(&mut writer, part, event)?;
                    }
                }
                write(&mut writer, part, Event::End(element))?;
                let local = path.pop().unwrap_or_default();
                rewriter.end(&path, &local);
            }
            Event::Text(text) => {
                let replacement = text
                    .unescape()
                    .ok()
                    .and_then(|current| rewriter.text(&path, &current));
                match replacement {
                    Some(new_text) => {
                        changed = true;
                        write(&mut writer, part, Event::Text(BytesText::new(&new_text)))?;
                    }
                    None => write(&mut writer, part, Event::Text(text))?,
                }
            }
            Event::Eof => break,
            other => write(&mut writer, part, other)?,
        }
    }

    Ok((writer.into_inner(), changed))
}

fn write(writer: &mut Writer<Vec<u8>>, part: &str, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| SanitizeError::malformed_part(part, e))
}

/// Nombre local (sin prefijo) de un elemento.
pub(crate) fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Valor de un atributo por nombre local, sin importar su prefijo.
pub(crate) fn attr(element: &BytesStart<'_>, local: &str) -> Option<String> {
    element.attributes().flatten().find_map(|attribute| {
        if attribute.key.local_name().as_ref() == local.as_bytes() {
            attribute.unescape_value().ok().map(Cow::into_owned)
        } else {
            None
        }
    })
}

/// Edición de un atributo al reconstruir un elemento.
pub(crate) enum AttrEdit {
    Keep,
    Drop,
    Set(String),
}

/// Reconstruye `element` aplicando `edit` a cada atributo (recibe el nombre local).
/// Devuelve `None` si ningún atributo cambió.
pub(crate) fn edit_attributes<F>(element: &BytesStart<'_>, mut edit: F) -> Option<BytesStart<'static>>
where
    F: FnMut(&str, &str) -> AttrEdit,
{
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut rebuilt = BytesStart::new(name);
    let mut changed = false;

    for attribute in element.attributes().flatten() {
        let local = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map(Cow::into_owned)
            .unwrap_or_default();
        match edit(&local, &value) {
            AttrEdit::Keep => rebuilt.push_attribute(Attribute {
                key: attribute.key,
                value: Cow::Owned(attribute.value.into_owned()),
            }),
            AttrEdit::Drop => changed = true,
            AttrEdit::Set(new_value) => {
                if new_value != value {
                    changed = true;
                }
                let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
                rebuilt.push_attribute((key.as_str(), new_value.as_str()));
            }
        }
    }

    changed.then(|| rebuilt.into_owned())
}

/// Lee una parte XML completa como árbol.
pub(crate) fn parse_element(part: &str, contents: &[u8]) -> Result<Element> {
    Element::parse(Cursor::new(contents)).map_err(|e| SanitizeError::malformed_part(part, e))
}

/// Hijos directos que son elementos con el nombre local indicado.
pub(crate) fn children_named<'a>(
    element: &'a Element,
    local_name: &'a str,
) -> impl Iterator<Item = &'a Element> + 'a {
    element.children.iter().filter_map(move |node| match node {
        XMLNode::Element(child) if child.name == local_name => Some(child),
        _ => None,
    })
}

/// Recorre en profundidad todos los descendientes con el nombre local indicado.
pub(crate) fn descendants_named<'a>(element: &'a Element, local_name: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    let mut stack: Vec<&Element> = vec![element];
    while let Some(current) = stack.pop() {
        for node in current.children.iter().rev() {
            if let XMLNode::Element(child) = node {
                stack.push(child);
            }
        }
        if current.name == local_name && !std::ptr::eq(current, element) {
            found.push(current);
        }
    }
    found
}

/// Texto plano contenido directamente en un elemento.
pub(crate) fn element_text_content(element: &Element) -> String {
    let mut content = String::new();
    for node in &element.children {
        if let XMLNode::Text(text) = node {
            content.push_str(text);
        }
    }
    content.trim().to_string()
}
