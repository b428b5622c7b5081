#![forbid(unsafe_code)]

//! Chart view-models.
//!
//! Pure functions from an [`ItemProfile`] to the numbers the renderer draws.
//! No timing, no scene access: the panel state machine calls
//! [`render_charts`] on detail entry and hands the result to the scene.

use std::time::Duration;

use crate::profile::ItemProfile;

/// Youngest age on the age bar scale.
pub const AGE_SCALE_MIN: f32 = 18.0;
/// Oldest age on the age bar scale.
pub const AGE_SCALE_MAX: f32 = 65.0;
/// Number of dots in the favourites strip.
pub const FAVORITE_DOTS: usize = 20;
/// Favourite count that fills the whole strip.
pub const FAVORITE_SCALE: f32 = 200.0;
/// Stagger between successive dot reveals.
pub const DOT_STAGGER: Duration = Duration::from_millis(40);

/// One bar of a histogram, sized relative to the largest bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarView {
    pub label: String,
    pub value: u32,
    /// Target length in percent of the track (0..=100).
    pub fill_pct: f32,
}

/// One block of the time-of-day strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBlock {
    pub period: String,
    pub count: u32,
    pub peak: bool,
}

/// One dot of the favourites strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteDot {
    pub filled: bool,
    pub delay: Duration,
}

/// Everything a detail panel displays for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSet {
    pub avg_age_text: String,
    pub age_bar_pct: f32,
    pub age_bars: Vec<BarView>,
    pub peak_period: Option<String>,
    pub time_blocks: Vec<TimeBlock>,
    pub time_bars: Vec<BarView>,
    pub favorite_text: String,
    pub favorite_dots: Vec<FavoriteDot>,
    pub sales_readout: String,
}

/// Which summary card a piece of content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardKind {
    Age,
    Time,
    Favorite,
}

impl CardKind {
    pub const ALL: [Self; 3] = [Self::Age, Self::Time, Self::Favorite];

    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Time => "time",
            Self::Favorite => "fav",
        }
    }
}

/// Rendered content of one summary card, as copied into the expanded view.
#[derive(Debug, Clone, PartialEq)]
pub struct CardContent {
    pub kind: CardKind,
    pub title: String,
    pub headline: String,
    pub bars: Vec<BarView>,
}

/// Build the full chart set for a profile.
#[must_use]
pub fn render_charts(profile: &ItemProfile) -> ChartSet {
    let peak = profile.peak_period().map(str::to_string);
    let time_blocks = profile
        .time_of_day
        .iter()
        .map(|p| TimeBlock {
            period: p.period.clone(),
            count: p.count,
            peak: peak.as_deref() == Some(p.period.as_str()),
        })
        .collect();
    ChartSet {
        avg_age_text: profile.avg_age.to_string(),
        age_bar_pct: age_bar_percent(profile.avg_age),
        age_bars: scaled_bars(
            profile
                .age_distribution
                .iter()
                .map(|b| (b.bin.as_str(), b.count)),
        ),
        peak_period: peak,
        time_blocks,
        time_bars: scaled_bars(
            profile
                .time_of_day
                .iter()
                .map(|p| (p.period.as_str(), p.count)),
        ),
        favorite_text: profile.favorite_count.to_string(),
        favorite_dots: favorite_dots(profile.favorite_count),
        sales_readout: format_share(profile.sales_share),
    }
}

/// Summary cards for a profile, in display order.
#[must_use]
pub fn card_contents(charts: &ChartSet) -> Vec<CardContent> {
    CardKind::ALL
        .into_iter()
        .map(|kind| match kind {
            CardKind::Age => CardContent {
                kind,
                title: "Average age".to_string(),
                headline: charts.avg_age_text.clone(),
                bars: charts.age_bars.clone(),
            },
            CardKind::Time => CardContent {
                kind,
                title: "Peak time".to_string(),
                headline: charts.peak_period.clone().unwrap_or_default(),
                bars: charts.time_bars.clone(),
            },
            CardKind::Favorite => CardContent {
                kind,
                title: "Favourited".to_string(),
                headline: charts.favorite_text.clone(),
                bars: vec![BarView {
                    label: "favourites".to_string(),
                    value: charts.favorite_dots.iter().filter(|d| d.filled).count() as u32,
                    fill_pct: charts.favorite_dots.iter().filter(|d| d.filled).count() as f32
                        / FAVORITE_DOTS as f32
                        * 100.0,
                }],
            },
        })
        .collect()
}

/// Position of `avg_age` on the 18..65 scale, in percent, clamped.
#[must_use]
pub fn age_bar_percent(avg_age: u32) -> f32 {
    let pct = (avg_age as f32 - AGE_SCALE_MIN) / (AGE_SCALE_MAX - AGE_SCALE_MIN) * 100.0;
    pct.clamp(0.0, 100.0)
}

/// Favourites strip: at least one dot is always filled.
#[must_use]
pub fn favorite_dots(count: u32) -> Vec<FavoriteDot> {
    let filled = ((count as f32 / FAVORITE_SCALE) * FAVORITE_DOTS as f32)
        .round()
        .clamp(1.0, FAVORITE_DOTS as f32) as usize;
    (0..FAVORITE_DOTS)
        .map(|i| FavoriteDot {
            filled: i < filled,
            delay: DOT_STAGGER * i as u32,
        })
        .collect()
}

/// `22.1` → `"22.1%"`.
#[must_use]
pub fn format_share(share: f64) -> String {
    format!("{share:.1}%")
}

/// `22.1` → `"22.1% of sales"`.
#[must_use]
pub fn share_label(share: f64) -> String {
    format!("{share:.1}% of sales")
}

/// `"americano"` → `"Americano"`.
#[must_use]
pub fn display_name(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn scaled_bars<'a>(entries: impl Iterator<Item = (&'a str, u32)> + Clone) -> Vec<BarView> {
    let max = entries.clone().map(|(_, v)| v).max().unwrap_or(0);
    entries
        .map(|(label, value)| BarView {
            label: label.to_string(),
            value,
            fill_pct: if max == 0 {
                0.0
            } else {
                value as f32 / max as f32 * 100.0
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileTable;

    #[test]
    fn age_bar_clamps() {
        assert_eq!(age_bar_percent(10), 0.0);
        assert_eq!(age_bar_percent(90), 100.0);
        assert!((age_bar_percent(34) - 34.042_553).abs() < 1e-3);
    }

    #[test]
    fn favorite_dots_fill_proportionally() {
        let dots = favorite_dots(156);
        assert_eq!(dots.len(), FAVORITE_DOTS);
        assert_eq!(dots.iter().filter(|d| d.filled).count(), 16);
        assert_eq!(dots[3].delay, Duration::from_millis(120));
    }

    #[test]
    fn favorite_dots_never_empty() {
        assert_eq!(favorite_dots(0).iter().filter(|d| d.filled).count(), 1);
        assert_eq!(favorite_dots(10_000).iter().filter(|d| d.filled).count(), 20);
    }

    #[test]
    fn share_formats_to_one_decimal() {
        assert_eq!(format_share(22.1), "22.1%");
        assert_eq!(format_share(10.0), "10.0%");
        assert_eq!(share_label(18.7), "18.7% of sales");
    }

    #[test]
    fn display_name_capitalizes() {
        assert_eq!(display_name("americano"), "Americano");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn largest_bar_is_full() {
        let table = ProfileTable::builtin();
        let charts = render_charts(table.get("americano").unwrap());
        let max = charts
            .age_bars
            .iter()
            .map(|b| b.fill_pct)
            .fold(0.0f32, f32::max);
        assert_eq!(max, 100.0);
        assert_eq!(charts.sales_readout, "22.1%");
    }

    #[test]
    fn exactly_one_peak_block() {
        let table = ProfileTable::builtin();
        for (_, profile) in table.iter() {
            let charts = render_charts(profile);
            assert_eq!(charts.time_blocks.iter().filter(|b| b.peak).count(), 1);
        }
    }

    #[test]
    fn cards_cover_every_kind() {
        let table = ProfileTable::builtin();
        let charts = render_charts(table.get("latte").unwrap());
        let cards = card_contents(&charts);
        let kinds: Vec<_> = cards.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, CardKind::ALL.to_vec());
        assert_eq!(cards[1].headline, "Afternoon");
    }
}
