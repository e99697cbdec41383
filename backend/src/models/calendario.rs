use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;
use time::{Date, Duration, Month, OffsetDateTime, Weekday};

/// Italian weekday names, Monday first, as rendered in labels.
pub const GIORNI_SETTIMANA: [&str; 7] = [
    "LUNEDÌ",
    "MARTEDÌ",
    "MERCOLEDÌ",
    "GIOVEDÌ",
    "VENERDÌ",
    "SABATO",
    "DOMENICA",
];

pub const MESI_ANNO: [&str; 12] = [
    "GENNAIO",
    "FEBBRAIO",
    "MARZO",
    "APRILE",
    "MAGGIO",
    "GIUGNO",
    "LUGLIO",
    "AGOSTO",
    "SETTEMBRE",
    "OTTOBRE",
    "NOVEMBRE",
    "DICEMBRE",
];

fn giorno_settimana(data: Date) -> &'static str {
    GIORNI_SETTIMANA[data.weekday().number_days_from_monday() as usize]
}

fn nome_mese(data: Date) -> &'static str {
    MESI_ANNO[u8::from(data.month()) as usize - 1]
}

/// Header label for a day of the agenda. Today and its neighbours get a
/// relative prefix without the year; every other day gets the full
/// weekday/day/month/year form. All output is upper case.
pub fn etichetta_giorno(data: Date, oggi: Date) -> String {
    let breve = format!("{} {} {}", giorno_settimana(data), data.day(), nome_mese(data));
    if data == oggi {
        format!("OGGI - {breve}")
    } else if Some(data) == oggi.next_day() {
        format!("DOMANI - {breve}")
    } else if Some(data) == oggi.previous_day() {
        format!("IERI - {breve}")
    } else {
        format!("{breve} {}", data.year())
    }
}

/// One agenda section: a date, its label and the records that fall on it.
#[derive(Debug, Serialize)]
pub struct GruppoGiorno<T> {
    pub data: Date,
    pub etichetta: String,
    pub records: Vec<T>,
}

/// Groups records by calendar day, ascending, preserving input order within
/// each day. Days with no records simply do not appear.
pub fn raggruppa_per_giorno<T, F>(records: Vec<T>, oggi: Date, data_di: F) -> Vec<GruppoGiorno<T>>
where
    F: Fn(&T) -> Date,
{
    let mut per_data: BTreeMap<Date, Vec<T>> = BTreeMap::new();
    for record in records {
        per_data.entry(data_di(&record)).or_default().push(record);
    }
    per_data
        .into_iter()
        .map(|(data, records)| GruppoGiorno {
            data,
            etichetta: etichetta_giorno(data, oggi),
            records,
        })
        .collect()
}

/// One cell of the month calendar. Cells outside the requested month are
/// the leading/trailing filler needed to complete the Monday-first weeks.
#[derive(Debug, Clone, Serialize)]
pub struct CellaGiorno {
    pub data: Date,
    pub giorno: u8,
    pub nel_mese: bool,
    pub weekend: bool,
    pub oggi: bool,
}

/// Builds the Monday-first grid for a month: leading filler back to Monday,
/// the month itself, trailing filler to complete the last week. Returns
/// `None` for an invalid month or a year outside the supported range.
pub fn griglia_mese(anno: i32, mese: u8, oggi: Date) -> Option<Vec<CellaGiorno>> {
    if !(1970..=2100).contains(&anno) {
        return None;
    }
    let mese = Month::try_from(mese).ok()?;
    let primo = Date::from_calendar_date(anno, mese, 1).ok()?;

    let giorni_nel_mese = time::util::days_in_year_month(anno, mese) as i64;
    let testa = primo.weekday().number_days_from_monday() as i64;
    let celle = (testa + giorni_nel_mese + 6) / 7 * 7;
    let inizio = primo - Duration::days(testa);

    let mut griglia = Vec::with_capacity(celle as usize);
    for i in 0..celle {
        let data = inizio + Duration::days(i);
        griglia.push(CellaGiorno {
            data,
            giorno: data.day(),
            nel_mese: data.month() == mese && data.year() == anno,
            weekend: matches!(data.weekday(), Weekday::Saturday | Weekday::Sunday),
            oggi: data == oggi,
        });
    }
    Some(griglia)
}

/// Current date in the configured IANA timezone. An unknown name falls back
/// to UTC with a warning instead of failing the request.
pub fn oggi_in_timezone(timezone: &str) -> Date {
    let naive = match timezone.parse::<chrono_tz::Tz>() {
        Ok(zona) => chrono::Utc::now().with_timezone(&zona).date_naive(),
        Err(_) => {
            tracing::warn!(timezone, "unknown timezone, falling back to UTC");
            chrono::Utc::now().date_naive()
        }
    };
    Date::from_ordinal_date(naive.year(), naive.ordinal() as u16)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn label_for_today_has_relative_prefix_and_no_year() {
        let oggi = date!(2026 - 08 - 25);
        assert_eq!(etichetta_giorno(oggi, oggi), "OGGI - MARTEDÌ 25 AGOSTO");
    }

    #[test]
    fn labels_for_neighbouring_days() {
        let oggi = date!(2026 - 08 - 25);
        assert_eq!(
            etichetta_giorno(date!(2026 - 08 - 26), oggi),
            "DOMANI - MERCOLEDÌ 26 AGOSTO"
        );
        assert_eq!(
            etichetta_giorno(date!(2026 - 08 - 24), oggi),
            "IERI - LUNEDÌ 24 AGOSTO"
        );
    }

    #[test]
    fn generic_label_includes_year() {
        let oggi = date!(2026 - 08 - 25);
        assert_eq!(
            etichetta_giorno(date!(2026 - 09 - 01), oggi),
            "MARTEDÌ 1 SETTEMBRE 2026"
        );
    }

    #[test]
    fn relative_labels_cross_month_and_year_boundaries() {
        assert_eq!(
            etichetta_giorno(date!(2026 - 09 - 01), date!(2026 - 08 - 31)),
            "DOMANI - MARTEDÌ 1 SETTEMBRE"
        );
        assert_eq!(
            etichetta_giorno(date!(2027 - 01 - 01), date!(2026 - 12 - 31)),
            "DOMANI - VENERDÌ 1 GENNAIO"
        );
        assert_eq!(
            etichetta_giorno(date!(2026 - 07 - 31), date!(2026 - 08 - 01)),
            "IERI - VENERDÌ 31 LUGLIO"
        );
    }

    #[test]
    fn grouping_sorts_days_ascending_and_keeps_input_order_within_a_day() {
        let oggi = date!(2026 - 08 - 25);
        let records = vec![
            (date!(2026 - 08 - 26), "b"),
            (date!(2026 - 08 - 25), "a1"),
            (date!(2026 - 08 - 26), "c"),
            (date!(2026 - 08 - 25), "a2"),
        ];
        let gruppi = raggruppa_per_giorno(records, oggi, |r| r.0);

        assert_eq!(gruppi.len(), 2);
        assert_eq!(gruppi[0].data, date!(2026 - 08 - 25));
        assert_eq!(gruppi[0].etichetta, "OGGI - MARTEDÌ 25 AGOSTO");
        let giorno_uno: Vec<_> = gruppi[0].records.iter().map(|r| r.1).collect();
        assert_eq!(giorno_uno, vec!["a1", "a2"]);
        assert_eq!(gruppi[1].data, date!(2026 - 08 - 26));
    }

    #[test]
    fn grid_starts_on_monday_and_is_a_whole_number_of_weeks() {
        // February 2026 starts on a Sunday: 6 leading filler days.
        let griglia = griglia_mese(2026, 2, date!(2026 - 02 - 14)).unwrap();
        assert_eq!(griglia.len() % 7, 0);
        assert_eq!(griglia.len(), 35);
        assert_eq!(griglia[0].data, date!(2026 - 01 - 26));
        assert_eq!(griglia[0].data.weekday(), Weekday::Monday);
        assert!(!griglia[0].nel_mese);
        assert!(griglia[6].nel_mese);
        assert_eq!(griglia[6].data, date!(2026 - 02 - 01));
    }

    #[test]
    fn grid_trailing_filler_completes_the_last_week() {
        // June 2026 starts on a Monday and ends on a Tuesday.
        let griglia = griglia_mese(2026, 6, date!(2026 - 06 - 15)).unwrap();
        assert_eq!(griglia.len(), 35);
        assert!(griglia[0].nel_mese);
        assert_eq!(griglia[29].data, date!(2026 - 06 - 30));
        assert!(griglia[29].nel_mese);
        assert!(!griglia[30].nel_mese);
        assert_eq!(griglia[34].data, date!(2026 - 07 - 05));
    }

    #[test]
    fn grid_flags_weekends_and_today() {
        let griglia = griglia_mese(2026, 8, date!(2026 - 08 - 25)).unwrap();
        let oggi: Vec<_> = griglia.iter().filter(|c| c.oggi).collect();
        assert_eq!(oggi.len(), 1);
        assert_eq!(oggi[0].data, date!(2026 - 08 - 25));
        for cella in &griglia {
            let atteso = matches!(cella.data.weekday(), Weekday::Saturday | Weekday::Sunday);
            assert_eq!(cella.weekend, atteso, "data: {}", cella.data);
        }
    }

    #[test]
    fn grid_rejects_invalid_month_and_year() {
        assert!(griglia_mese(2026, 0, date!(2026 - 01 - 01)).is_none());
        assert!(griglia_mese(2026, 13, date!(2026 - 01 - 01)).is_none());
        assert!(griglia_mese(1800, 5, date!(2026 - 01 - 01)).is_none());
    }

    #[test]
    fn unknown_timezone_still_yields_a_date() {
        // Falls back to UTC rather than erroring.
        let a = oggi_in_timezone("Not/AZone");
        let b = oggi_in_timezone("Etc/UTC");
        assert!(a == b || a == b.previous_day().unwrap() || a == b.next_day().unwrap());
    }
}
