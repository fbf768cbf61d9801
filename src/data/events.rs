//! Built-in list of Brent-relevant events, used when no `events.csv` exists.

use crate::domain::{Event, EventCategory};
use crate::error::DataError;
use crate::preprocess::parse_date;

use EventCategory::*;

const CURATED: &[(&str, &str, EventCategory)] = &[
    ("Iraq invades Kuwait", "1990-08-02", Geopolitical),
    ("Operation Desert Storm begins", "1991-01-17", Geopolitical),
    ("Thai baht devaluation (Asian financial crisis)", "1997-07-02", EconomicCrisis),
    ("OPEC and non-OPEC production cuts", "1999-03-23", OpecDecision),
    ("September 11 attacks", "2001-09-11", Geopolitical),
    ("Venezuelan oil strike", "2002-12-02", SupplyDisruption),
    ("US-led invasion of Iraq", "2003-03-20", Geopolitical),
    ("Hurricane Katrina", "2005-08-29", SupplyDisruption),
    ("Lehman Brothers bankruptcy", "2008-09-15", EconomicCrisis),
    ("OPEC Oran production cut", "2008-12-17", OpecDecision),
    ("Libyan civil war", "2011-02-17", Geopolitical),
    ("OPEC declines to cut output", "2014-11-27", OpecDecision),
    ("Iran nuclear deal (JCPOA)", "2015-07-14", Geopolitical),
    ("OPEC+ Vienna production cut", "2016-11-30", OpecDecision),
    ("US withdraws from Iran nuclear deal", "2018-05-08", Geopolitical),
    ("Abqaiq-Khurais drone attacks", "2019-09-14", SupplyDisruption),
    ("OPEC+ talks collapse (price war)", "2020-03-06", OpecDecision),
    ("COVID-19 declared pandemic", "2020-03-11", Pandemic),
    ("OPEC+ record output cut", "2020-04-12", OpecDecision),
    ("Russia invades Ukraine", "2022-02-24", Geopolitical),
];

/// The curated events in date order.
pub fn curated_events() -> Result<Vec<Event>, DataError> {
    CURATED
        .iter()
        .map(|&(name, date, category)| {
            let event_date = parse_date(date).ok_or_else(|| DataError::new(format!("invalid built-in event date '{date}'")))?;
            Ok(Event {
                name: name.to_string(),
                event_date,
                category,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ensure_unique_names;

    #[test]
    fn curated_list_is_valid_and_sorted() {
        let events = curated_events().unwrap();
        assert_eq!(events.len(), CURATED.len());
        ensure_unique_names(&events).unwrap();
        assert!(events.windows(2).all(|w| w[0].event_date <= w[1].event_date));
        assert_eq!(events[0].event_date.to_string(), "1990-08-02");
        assert_eq!(events.last().unwrap().event_date.to_string(), "2022-02-24");
    }
}
