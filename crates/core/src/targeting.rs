//! Discovery targeting: the locations, categories, and run intervals an
//! operator can choose from.

use std::time::Duration;

define_string_enum! {
    /// Market a discovery search is scoped to.
    Location {
        UnitedStates = "us",
        UnitedKingdom = "uk",
        Canada = "ca",
        Australia = "au",
        Germany = "de",
        France = "fr",
        Spain = "es",
        Italy = "it",
        Netherlands = "nl",
        India = "in",
    }
}

define_string_enum! {
    /// Vertical a discovery search is scoped to.
    Category {
        Saas = "saas",
        Ecommerce = "ecommerce",
        Marketing = "marketing",
        Finance = "finance",
        Health = "health",
        Education = "education",
        Travel = "travel",
        Technology = "technology",
        RealEstate = "real_estate",
        Food = "food",
    }
}

define_string_enum! {
    /// How often the automation enqueues discovery.
    Interval {
        OneHour = "1h",
        TwoHours = "2h",
        ThreeHours = "3h",
        FourHours = "4h",
        FiveHours = "5h",
        Daily = "daily",
        Weekly = "weekly",
    }
}

impl Category {
    /// Keywords matched against a prospect's title and URL when scoring
    /// topical relevance.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Category::Saas => &["saas", "software", "platform", "cloud", "subscription", "app"],
            Category::Ecommerce => &["shop", "store", "ecommerce", "cart", "retail", "buy"],
            Category::Marketing => &["marketing", "seo", "agency", "brand", "advertising", "growth"],
            Category::Finance => &["finance", "bank", "invest", "loan", "insurance", "fintech"],
            Category::Health => &["health", "clinic", "medical", "wellness", "care", "fitness"],
            Category::Education => &["education", "school", "course", "learn", "academy", "training"],
            Category::Travel => &["travel", "tour", "hotel", "flight", "trip", "booking"],
            Category::Technology => &["tech", "technology", "digital", "data", "ai", "dev"],
            Category::RealEstate => &["realestate", "property", "homes", "realty", "rent", "estate"],
            Category::Food => &["food", "restaurant", "recipe", "cafe", "kitchen", "catering"],
        }
    }
}

impl Interval {
    /// Wall-clock period between automated discovery runs.
    pub fn period(self) -> Duration {
        const HOUR: u64 = 3600;
        let secs = match self {
            Interval::OneHour => HOUR,
            Interval::TwoHours => 2 * HOUR,
            Interval::ThreeHours => 3 * HOUR,
            Interval::FourHours => 4 * HOUR,
            Interval::FiveHours => 5 * HOUR,
            Interval::Daily => 24 * HOUR,
            Interval::Weekly => 7 * 24 * HOUR,
        };
        Duration::from_secs(secs)
    }
}

/// Parse a list of raw strings into typed values, rejecting unknown entries
/// and dropping duplicates while keeping first-seen order.
pub fn parse_set<T>(raw: &[String]) -> Result<Vec<T>, crate::error::CoreError>
where
    T: std::str::FromStr<Err = crate::error::CoreError> + PartialEq,
{
    let mut out: Vec<T> = Vec::with_capacity(raw.len());
    for value in raw {
        let parsed: T = value.parse()?;
        if !out.contains(&parsed) {
            out.push(parsed);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_periods_increase() {
        let periods: Vec<_> = Interval::ALL.iter().map(|i| i.period()).collect();
        assert!(periods.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(Interval::Daily.period(), Duration::from_secs(86_400));
    }

    #[test]
    fn every_category_has_keywords() {
        for c in Category::ALL {
            assert!(!c.keywords().is_empty(), "{c} has no keywords");
        }
    }

    #[test]
    fn parse_set_dedupes_and_rejects_unknown() {
        let raw = vec!["us".to_string(), "uk".to_string(), "us".to_string()];
        let parsed: Vec<Location> = parse_set(&raw).unwrap();
        assert_eq!(parsed, vec![Location::UnitedStates, Location::UnitedKingdom]);

        let bad = vec!["mars".to_string()];
        assert!(parse_set::<Location>(&bad).is_err());
    }

    #[test]
    fn interval_serializes_as_its_label() {
        let json = serde_json::to_string(&Interval::Weekly).unwrap();
        assert_eq!(json, "\"weekly\"");
        let back: Interval = serde_json::from_str("\"3h\"").unwrap();
        assert_eq!(back, Interval::ThreeHours);
    }
}
