/// Placeholder phone used when a scheduled doctor has no directory entry.
pub const UNKNOWN_PHONE: &str = "Unknown";

/// Country prefix prepended to local numbers for WhatsApp links.
const WHATSAPP_COUNTRY_PREFIX: &str = "6";

/// `tel:` link with all whitespace removed.
pub fn tel_link(phone: &str) -> String {
    let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    format!("tel:{}", compact)
}

/// `wa.me` link built from the digits of a local number.
pub fn whatsapp_link(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("https://wa.me/{}{}", WHATSAPP_COUNTRY_PREFIX, digits)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialLinks {
    pub tel: String,
    pub whatsapp: String,
}

/// Both links for a phone, or None for an unknown number.
pub fn dial_links(phone: &str) -> Option<DialLinks> {
    let phone = phone.trim();
    if phone.is_empty() || phone == UNKNOWN_PHONE {
        return None;
    }
    Some(DialLinks {
        tel: tel_link(phone),
        whatsapp: whatsapp_link(phone),
    })
}
