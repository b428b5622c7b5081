#![forbid(unsafe_code)]

//! The visual tree the engine mutates.
//!
//! A [`Scene`] is a flat map of [`Element`]s keyed by string id, standing in
//! for the mounted markup. The engine never renders; it writes target values,
//! transitions, classes and text, and the rendering collaborator samples
//! them. Every write goes through [`Scene::edit`], which returns `None` for
//! an element that is not mounted, so writes to missing targets are silent
//! no-ops.
//!
//! The scene carries its own notion of "now" (set by the session before each
//! dispatch) so property writes can record when their tween started.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use crate::animation::{Animated, KeyframeLoop, Transition};
use crate::charts::{CardContent, CardKind, ChartSet, card_contents};
use crate::config::PourGeometry;
use crate::profile::ProfileTable;

/// Well-known element ids.
pub mod ids {
    use crate::charts::CardKind;

    pub const GLASS_GROUP: &str = "glass-group";
    pub const LIQUID_FILL: &str = "liquid-fill";
    pub const LIQUID_SURFACE: &str = "liquid-surface";
    pub const GLASS_PCT: &str = "glass-pct-text";
    pub const STREAM_LEFT: &str = "stream-left";
    pub const STREAM_RIGHT: &str = "stream-right";
    pub const DRIP_GROUP: &str = "drip-group";
    pub const DRIP_L1: &str = "drip-l1";
    pub const DRIP_L2: &str = "drip-l2";
    pub const DRIP_R1: &str = "drip-r1";
    pub const DRIP_R2: &str = "drip-r2";
    pub const SCREEN_DRINK_LABEL: &str = "screen-drink-label";
    pub const SCREEN_PCT_LABEL: &str = "screen-pct-label";
    pub const DISMISS_HINT: &str = "dismiss-hint";
    pub const OVERLAY: &str = "expanded-card";

    pub const STREAMS: [&str; 2] = [STREAM_LEFT, STREAM_RIGHT];
    pub const DRIP_DROPS: [&str; 4] = [DRIP_L1, DRIP_L2, DRIP_R1, DRIP_R2];

    /// The home panel's id.
    pub const HOME: &str = "home";

    #[must_use]
    pub fn panel(id: &str) -> String {
        format!("panel-{id}")
    }

    #[must_use]
    pub fn nav_button(id: &str) -> String {
        format!("nav-{id}")
    }

    #[must_use]
    pub fn drink_card(id: &str) -> String {
        format!("drink-card-{id}")
    }

    #[must_use]
    pub fn content_card(item: &str, kind: CardKind) -> String {
        format!("{item}-{}-card", kind.slug())
    }

    #[must_use]
    pub fn item_field(item: &str, field: &str) -> String {
        format!("{item}-{field}")
    }
}

/// Class toggled on the panel currently shown.
pub const CLASS_ACTIVE: &str = "active";
/// Class toggled on the panel fading out.
pub const CLASS_LEAVING: &str = "leaving";
/// Class toggled on the highlighted nav button.
pub const CLASS_ACTIVE_NAV: &str = "active-nav";
/// Class toggled on the peak time-of-day block.
pub const CLASS_PEAK: &str = "peak";
/// Class toggled on the overlay while shown.
pub const CLASS_VISIBLE: &str = "visible";

/// Scalar properties the engine animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Opacity,
    Height,
    Y,
    /// Width in percent of the track.
    Width,
}

/// One mounted visual element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    opacity: Animated,
    height: Animated,
    y: Animated,
    width: Animated,
    transition: Option<Transition>,
    classes: BTreeSet<String>,
    attrs: BTreeMap<String, String>,
    text: Option<String>,
    keyframes: Option<KeyframeLoop>,
}

impl Element {
    /// An element at rest with every property at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            opacity: Animated::at(0.0),
            height: Animated::at(0.0),
            y: Animated::at(0.0),
            width: Animated::at(0.0),
            transition: None,
            classes: BTreeSet::new(),
            attrs: BTreeMap::new(),
            text: None,
            keyframes: None,
        }
    }

    /// Builder: starting value of a property.
    #[must_use]
    pub fn with(mut self, prop: Property, value: f32) -> Self {
        *self.slot_mut(prop) = Animated::at(value);
        self
    }

    /// Builder: starting class.
    #[must_use]
    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.insert(class.to_string());
        self
    }

    fn slot(&self, prop: Property) -> &Animated {
        match prop {
            Property::Opacity => &self.opacity,
            Property::Height => &self.height,
            Property::Y => &self.y,
            Property::Width => &self.width,
        }
    }

    fn slot_mut(&mut self, prop: Property) -> &mut Animated {
        match prop {
            Property::Opacity => &mut self.opacity,
            Property::Height => &mut self.height,
            Property::Y => &mut self.y,
            Property::Width => &mut self.width,
        }
    }

    /// Value the property is heading to.
    #[must_use]
    pub fn target(&self, prop: Property) -> f32 {
        self.slot(prop).target()
    }

    /// Value as rendered at `at`.
    #[must_use]
    pub fn sample(&self, prop: Property, at: Duration) -> f32 {
        self.slot(prop).sample(at)
    }

    /// Raw tween state of a property.
    #[must_use]
    pub fn animated(&self, prop: Property) -> &Animated {
        self.slot(prop)
    }

    /// Transition that applies to the next write.
    #[must_use]
    pub fn transition(&self) -> Option<Transition> {
        self.transition
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Repeating animation currently armed on this element.
    #[must_use]
    pub fn keyframes(&self) -> Option<&KeyframeLoop> {
        self.keyframes.as_ref()
    }
}

impl Default for Element {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable access to one element at the scene's current time.
pub struct Edit<'a> {
    element: &'a mut Element,
    now: Duration,
}

impl Edit<'_> {
    /// Set the transition used by subsequent writes. `None` disables it.
    pub fn transition(&mut self, transition: Option<Transition>) -> &mut Self {
        self.element.transition = transition;
        self
    }

    /// Write a property using the element's current transition.
    pub fn set(&mut self, prop: Property, value: f32) -> &mut Self {
        let transition = self.element.transition;
        let now = self.now;
        self.element.slot_mut(prop).set(value, now, transition);
        self
    }

    /// Write a property with its own transition, leaving the element's
    /// default untouched.
    pub fn animate(&mut self, prop: Property, value: f32, transition: Transition) -> &mut Self {
        let now = self.now;
        self.element.slot_mut(prop).set(value, now, Some(transition));
        self
    }

    pub fn add_class(&mut self, class: &str) -> &mut Self {
        self.element.classes.insert(class.to_string());
        self
    }

    pub fn remove_class(&mut self, class: &str) -> &mut Self {
        self.element.classes.remove(class);
        self
    }

    /// Add or remove `class` depending on `on`.
    pub fn toggle_class(&mut self, class: &str, on: bool) -> &mut Self {
        if on {
            self.add_class(class)
        } else {
            self.remove_class(class)
        }
    }

    pub fn attr(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.element.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.element.text = Some(text.into());
        self
    }

    /// Arm a repeating animation, anchored at the current time.
    pub fn start_loop(&mut self, mut keyframes: KeyframeLoop) -> &mut Self {
        keyframes.started_at = self.now;
        self.element.keyframes = Some(keyframes);
        self
    }

    /// Disarm the repeating animation so it restarts cleanly next time.
    pub fn stop_loop(&mut self) -> &mut Self {
        self.element.keyframes = None;
        self
    }
}

/// Viewport or design size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// Uniform scale that fits `design` inside `viewport`.
#[must_use]
pub fn fit_scale(viewport: Size, design: Size) -> f32 {
    if design.width <= 0.0 || design.height <= 0.0 {
        return 1.0;
    }
    (viewport.width / design.width)
        .min(viewport.height / design.height)
        .max(0.0)
}

/// Authored size of the presentation.
pub const DESIGN_SIZE: Size = Size {
    width: 1920.0,
    height: 1080.0,
};

/// The mounted visual tree.
#[derive(Debug, Clone)]
pub struct Scene {
    now: Duration,
    elements: HashMap<String, Element>,
    cards: HashMap<String, CardContent>,
    scale: f32,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// An empty scene with nothing mounted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            elements: HashMap::new(),
            cards: HashMap::new(),
            scale: 1.0,
        }
    }

    /// Mount the full presentation for `profiles`.
    #[must_use]
    pub fn brew_layout(profiles: &ProfileTable, geometry: &PourGeometry) -> Self {
        let mut scene = Self::new();
        scene.mount(ids::panel(ids::HOME), Element::new().with_class(CLASS_ACTIVE));
        scene.mount(ids::nav_button(ids::HOME), Element::new().with_class(CLASS_ACTIVE_NAV));
        for id in profiles.ids() {
            scene.mount(ids::panel(id), Element::new());
            scene.mount(ids::nav_button(id), Element::new());
            scene.mount(ids::drink_card(id), Element::new());
            for field in ["age", "age-bar", "time", "fav", "dots", "sales-pct"] {
                scene.mount(ids::item_field(id, field), Element::new());
            }
            if let Some(profile) = profiles.get(id) {
                for period in &profile.time_of_day {
                    scene.mount(
                        ids::item_field(id, &format!("time-{}", period.period)),
                        Element::new(),
                    );
                }
            }
            for kind in CardKind::ALL {
                scene.mount(ids::content_card(id, kind), Element::new());
            }
        }
        scene.mount(ids::GLASS_GROUP, Element::new());
        scene.mount(
            ids::LIQUID_FILL,
            Element::new().with(Property::Y, geometry.base_y),
        );
        scene.mount(
            ids::LIQUID_SURFACE,
            Element::new().with(Property::Y, geometry.base_y),
        );
        for id in [
            ids::GLASS_PCT,
            ids::STREAM_LEFT,
            ids::STREAM_RIGHT,
            ids::DRIP_GROUP,
            ids::SCREEN_DRINK_LABEL,
            ids::SCREEN_PCT_LABEL,
            ids::OVERLAY,
        ] {
            scene.mount(id, Element::new());
        }
        for id in ids::DRIP_DROPS {
            scene.mount(id, Element::new());
        }
        scene.mount(ids::DISMISS_HINT, Element::new().with(Property::Opacity, 1.0));
        scene
    }

    /// Mount (or replace) an element.
    pub fn mount(&mut self, id: impl Into<String>, element: Element) {
        self.elements.insert(id.into(), element);
    }

    /// Remove an element. Later writes to it become no-ops.
    pub fn unmount(&mut self, id: &str) -> Option<Element> {
        self.cards.remove(id);
        self.elements.remove(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Edit a mounted element. `None` when the element is not mounted.
    pub fn edit(&mut self, id: &str) -> Option<Edit<'_>> {
        let now = self.now;
        self.elements
            .get_mut(id)
            .map(|element| Edit { element, now })
    }

    /// Time stamp applied to tweens started by subsequent edits.
    pub fn set_now(&mut self, now: Duration) {
        self.now = now;
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Shortcut: sampled value of a property at the scene's current time.
    #[must_use]
    pub fn value(&self, id: &str, prop: Property) -> Option<f32> {
        self.get(id).map(|e| e.sample(prop, self.now))
    }

    /// Shortcut: target value of a property.
    #[must_use]
    pub fn target(&self, id: &str, prop: Property) -> Option<f32> {
        self.get(id).map(|e| e.target(prop))
    }

    /// Rendered content of a summary card, if its panel has been populated.
    #[must_use]
    pub fn card(&self, card_id: &str) -> Option<&CardContent> {
        self.cards.get(card_id)
    }

    /// Write a chart set into an item's panel and register its cards.
    ///
    /// Fields that are not mounted are skipped.
    pub fn apply_charts(&mut self, item: &str, charts: &ChartSet) {
        if let Some(mut e) = self.edit(&ids::item_field(item, "age")) {
            e.text(charts.avg_age_text.clone());
        }
        if let Some(mut e) = self.edit(&ids::item_field(item, "age-bar")) {
            e.set(Property::Width, charts.age_bar_pct);
        }
        if let Some(mut e) = self.edit(&ids::item_field(item, "time")) {
            e.text(charts.peak_period.clone().unwrap_or_default());
        }
        for block in &charts.time_blocks {
            let id = ids::item_field(item, &format!("time-{}", block.period));
            if let Some(mut e) = self.edit(&id) {
                e.toggle_class(CLASS_PEAK, block.peak)
                    .text(block.count.to_string());
            }
        }
        if let Some(mut e) = self.edit(&ids::item_field(item, "fav")) {
            e.text(charts.favorite_text.clone());
        }
        if let Some(mut e) = self.edit(&ids::item_field(item, "dots")) {
            let filled = charts.favorite_dots.iter().filter(|d| d.filled).count();
            e.attr("filled", filled.to_string())
                .attr("total", charts.favorite_dots.len().to_string());
        }
        if let Some(mut e) = self.edit(&ids::item_field(item, "sales-pct")) {
            e.text(charts.sales_readout.clone());
        }
        for content in card_contents(charts) {
            let card_id = ids::content_card(item, content.kind);
            if self.contains(&card_id) {
                self.cards.insert(card_id, content);
            }
        }
    }

    /// Current fit-to-viewport scale.
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Recompute the fit-to-viewport scale.
    pub fn resize(&mut self, viewport: Size) {
        self.scale = fit_scale(viewport, DESIGN_SIZE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Easing;
    use crate::charts::render_charts;

    fn layout() -> Scene {
        Scene::brew_layout(&ProfileTable::builtin(), &PourGeometry::default())
    }

    #[test]
    fn layout_mounts_home_active() {
        let scene = layout();
        assert!(scene.get("panel-home").unwrap().has_class(CLASS_ACTIVE));
        assert!(scene.contains("panel-americano"));
        assert_eq!(scene.target(ids::LIQUID_FILL, Property::Y), Some(588.0));
    }

    #[test]
    fn edit_missing_element_is_none() {
        let mut scene = Scene::new();
        assert!(scene.edit("nope").is_none());
    }

    #[test]
    fn edits_use_element_transition() {
        let mut scene = layout();
        scene.set_now(Duration::from_millis(1000));
        scene
            .edit(ids::STREAM_LEFT)
            .unwrap()
            .transition(Some(Transition::millis(500, Easing::Linear)))
            .set(Property::Height, 14.0);
        let el = scene.get(ids::STREAM_LEFT).unwrap();
        assert_eq!(el.target(Property::Height), 14.0);
        assert!((el.sample(Property::Height, Duration::from_millis(1250)) - 7.0).abs() < 1e-3);
    }

    #[test]
    fn apply_charts_populates_fields_and_cards() {
        let table = ProfileTable::builtin();
        let mut scene = layout();
        let charts = render_charts(table.get("americano").unwrap());
        scene.apply_charts("americano", &charts);
        assert_eq!(
            scene.get("americano-sales-pct").unwrap().text(),
            Some("22.1%")
        );
        assert!(scene.get("americano-time-Morning").unwrap().has_class(CLASS_PEAK));
        assert!(!scene.get("americano-time-Evening").unwrap().has_class(CLASS_PEAK));
        assert!(scene.card("americano-age-card").is_some());
        assert!(scene.card("latte-age-card").is_none());
    }

    #[test]
    fn loops_anchor_at_scene_time() {
        let mut scene = layout();
        scene.set_now(Duration::from_millis(300));
        scene.edit(ids::DRIP_L1).unwrap().start_loop(KeyframeLoop {
            keyframes: crate::animation::DRIP_FALL_LEFT,
            period: Duration::from_millis(700),
            delay: Duration::ZERO,
            easing: Easing::EaseIn,
            started_at: Duration::ZERO,
        });
        let kf = scene.get(ids::DRIP_L1).unwrap().keyframes().copied().unwrap();
        assert_eq!(kf.started_at, Duration::from_millis(300));
    }

    #[test]
    fn fit_scale_picks_tighter_axis() {
        let s = fit_scale(
            Size {
                width: 960.0,
                height: 1080.0,
            },
            DESIGN_SIZE,
        );
        assert!((s - 0.5).abs() < 1e-6);
        let degenerate = Size {
            width: 0.0,
            height: 1.0,
        };
        let viewport = Size {
            width: 10.0,
            height: 10.0,
        };
        assert_eq!(fit_scale(viewport, degenerate), 1.0);
    }
}
