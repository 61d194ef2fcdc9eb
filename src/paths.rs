//! Normalización de nombres de partes dentro del contenedor ZIP.

/// Nombre de la tabla de relaciones que pertenece a `part`.
pub fn rels_for_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file_name)) => format!("{dir}/_rels/{file_name}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Parte dueña de una tabla `_rels/*.rels`. `Some("")` indica la raíz del paquete.
pub fn owner_of_rels(rels_part: &str) -> Option<String> {
    let (dir, file_name) = match rels_part.rsplit_once('/') {
        Some((dir, file_name)) => (dir, file_name),
        None => return None,
    };
    let owner_file = file_name.strip_suffix(".rels")?;
    let owner_dir = if dir == "_rels" {
        ""
    } else {
        dir.strip_suffix("/_rels")?
    };

    if owner_file.is_empty() {
        return Some(owner_dir.to_string());
    }
    if owner_dir.is_empty() {
        Some(owner_file.to_string())
    } else {
        Some(format!("{owner_dir}/{owner_file}"))
    }
}

/// Resuelve el destino de una relación respecto al directorio de la parte que la declara.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        return normalize(source_part);
    }
    let target = percent_decode(target);
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute);
    }

    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

/// Quita separadores iniciales, unifica `\` y resuelve segmentos `.` y `..`.
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut out: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    let mut joined = out.join("/");
    if unified.ends_with('/') && !joined.is_empty() {
        joined.push('/');
    }
    joined
}

/// Compara dos nombres de parte como lo hace OPC: sin distinguir mayúsculas.
pub fn same_part(a: &str, b: &str) -> bool {
    normalize(&percent_decode(a)).eq_ignore_ascii_case(&normalize(&percent_decode(b)))
}

/// Nombre de parte tal como aparece en `[Content_Types].xml` (`/xl/workbook.xml`).
pub fn content_type_name(part: &str) -> String {
    format!("/{}", normalize(part))
}

pub fn extension_of(part: &str) -> Option<&str> {
    let file_name = part.rsplit('/').next().unwrap_or(part);
    file_name.rsplit_once('.').map(|(_, ext)| ext)
}

fn percent_decode(input: &str) -> String {
    fn hex_val(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    if !input.contains('%') {
        return input.to_string();
    }

    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2]))
        {
            decoded.push((hi << 4) | lo);
            i += 3;
            continue;
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(decoded).unwrap_or_else(|_| input.to_string())
}
