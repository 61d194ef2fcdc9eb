use chrono::{DateTime, Local, Utc};

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    let local: DateTime<Local> = time.into();
    local.format("%d/%m/%Y %H:%M:%S").to_string()
}

/// Tamaño del libro antes y después del saneamiento, con la variación relativa.
pub fn format_size_change(before: u64, after: u64) -> String {
    let delta = if before == 0 {
        0.0
    } else {
        (after as f64 - before as f64) * 100.0 / before as f64
    };
    format!("{} → {} ({delta:+.1} %)", compact_size(before), compact_size(after))
}

fn compact_size(bytes: u64) -> String {
    match bytes {
        0..1024 => format!("{bytes} B"),
        1024..1_048_576 => format!("{:.1} KiB", bytes as f64 / 1024.0),
        _ => format!("{:.1} MiB", bytes as f64 / 1_048_576.0),
    }
}

/// Acorta un hash largo para mostrarlo en una sola línea.
pub fn short_digest(digest: &str) -> String {
    if digest.len() <= 16 {
        return digest.to_string();
    }
    format!("{}…{}", &digest[..8], &digest[digest.len() - 8..])
}
