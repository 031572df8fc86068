//! Dates as the blog prints them (pt-BR).

use time::OffsetDateTime;

const MONTHS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// `25 mar 2021`
pub fn format_date(at: OffsetDateTime) -> String {
    format!(
        "{:02} {} {:04}",
        at.day(),
        MONTHS[usize::from(u8::from(at.month())) - 1],
        at.year()
    )
}

/// `Editado em 25 mar 2021, às 19:27`
pub fn format_edited(at: OffsetDateTime) -> String {
    format!(
        "Editado em {}, às {:02}:{:02}",
        format_date(at),
        at.hour(),
        at.minute()
    )
}
