//! URL-safe names for stored uploads.

use rand::Rng;

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 8;

/// Lowercase, transliterate common accented letters, drop anything outside
/// `[a-z0-9 -]`, then turn spaces into single hyphens.
///
/// The output only ever contains `[a-z0-9-]`, so `slug(slug(x)) == slug(x)`.
pub fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.trim().to_lowercase().chars() {
        let c = match transliterate(c) {
            c @ ('a'..='z' | '0'..='9') => c,
            ' ' | '-' => '-',
            _ => continue,
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out
}

fn transliterate(c: char) -> char {
    match c {
        'ã' | 'à' | 'á' | 'ä' | 'â' | 'å' => 'a',
        'ẽ' | 'è' | 'é' | 'ë' | 'ê' => 'e',
        'ì' | 'í' | 'ï' | 'î' => 'i',
        'õ' | 'ò' | 'ó' | 'ö' | 'ô' | 'ø' => 'o',
        'ù' | 'ú' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'ý' | 'ÿ' => 'y',
        '·' | '/' | '_' | ',' | ':' | ';' => '-',
        other => other,
    }
}

/// Eight random characters from `[a-z0-9]`.
pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect()
}

/// Name under which an upload is stored: `{slug(title)}-{suffix}.{extension}`.
pub fn stored_file_name(title: &str, extension: &str) -> String {
    format!("{}.{}", slug(&format!("{title} {}", random_suffix())), extension)
}
