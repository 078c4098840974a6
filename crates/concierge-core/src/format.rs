// Display formatting shared by tool results and page payloads.

use crate::listing::Address;
use crate::repository::PriceRange;

/// `350000` → `"$350,000"`. No cents.
pub fn format_price(price: u64) -> String {
    format!("${}", format_number(price))
}

/// Thousands-separated integer.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_square_feet(sqft: Option<u32>) -> String {
    match sqft {
        Some(n) if n > 0 => format!("{} sq ft", format_number(u64::from(n))),
        _ => "N/A".to_string(),
    }
}

/// `"3 beds • 1 bath"`.
pub fn format_bed_bath(beds: u32, baths: f64) -> String {
    let bed_label = if beds == 1 { "bed" } else { "beds" };
    let bath_label = if baths == 1.0 { "bath" } else { "baths" };
    format!("{beds} {bed_label} \u{2022} {baths} {bath_label}")
}

pub fn format_address(address: &Address) -> String {
    format!(
        "{}, {}, {} {}",
        address.street, address.city, address.state, address.zip
    )
}

pub fn format_short_address(address: &Address) -> String {
    format!("{}, {}", address.street, address.city)
}

/// Street, city and state, the one-line form used in chat previews.
pub fn format_preview_address(address: &Address) -> String {
    format!("{}, {}, {}", address.street, address.city, address.state)
}

/// Normalize bare 10-digit phone numbers to `(712) 555-0100`; anything else
/// (already formatted, extensions, international) passes through.
pub fn format_phone(phone: &str) -> String {
    if phone.contains('(') {
        return phone.to_string();
    }
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 10 {
        format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..])
    } else {
        phone.to_string()
    }
}

/// `"$150K - $900K"`.
pub fn format_price_range_compact(range: PriceRange) -> String {
    let k = |n: u64| (n as f64 / 1000.0).round() as u64;
    format!("${}K - ${}K", k(range.min), k(range.max))
}

/// Cut to `max_chars` characters and append `...` when anything was cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

/// URL slug for an agent name: lower-case, runs of anything non-alphanumeric
/// collapsed to a single `-`, no leading or trailing dash.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}
