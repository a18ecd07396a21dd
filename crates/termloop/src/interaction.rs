//! Pointer interaction on top of raw mouse reports.
//!
//! The building blocks are independent and can be used on their own:
//!
//! - [`HoverTracker`] follows which named area the pointer is over.
//! - [`ClickTracker`] turns presses into single/double/triple clicks.
//! - [`DragTracker`] follows a press-move-release gesture relative to a
//!   caller-supplied baseline.
//! - [`calculate_menu_position`] places a popup so it stays on screen.
//!
//! [`MouseInteraction`] combines the trackers and is what the program
//! runtime drives with every [`MouseEvent`], using the areas the model
//! reports from [`Model::hit_areas`].
//!
//! [`Model::hit_areas`]: crate::program::Model::hit_areas

use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::event::{MouseAction, MouseButton, MouseEvent};

/// A cell position. May be negative for areas partially off screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset from `origin` to `self`.
    #[inline]
    pub fn delta_from(self, origin: Position) -> DragDelta {
        DragDelta {
            dx: self.x.saturating_sub(origin.x),
            dy: self.y.saturating_sub(origin.y),
        }
    }

    /// Chebyshev distance in cells.
    #[inline]
    fn distance(self, other: Position) -> u32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).unsigned_abs();
        u32::try_from(dx.max(dy)).unwrap_or(u32::MAX)
    }
}

impl From<&MouseEvent> for Position {
    fn from(event: &MouseEvent) -> Self {
        Self::new(i32::from(event.x), i32::from(event.y))
    }
}

/// A rectangle of cells. Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BoundingBox {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl BoundingBox {
    /// Negative dimensions are clamped to zero.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width: width.max(0),
            height: height.max(0),
        }
    }

    #[inline]
    pub fn x(&self) -> i32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.y
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn with_position(self, x: i32, y: i32) -> Self {
        Self { x, y, ..self }
    }

    pub fn with_size(self, width: i32, height: i32) -> Self {
        Self::new(self.x, self.y, width, height)
    }

    /// Whether `position` lies inside. Right and bottom edges are exclusive.
    pub fn contains(&self, position: Position) -> bool {
        let (px, py) = (i64::from(position.x), i64::from(position.y));
        let (x, y) = (i64::from(self.x), i64::from(self.y));
        px >= x
            && py >= y
            && px < x + i64::from(self.width)
            && py < y + i64::from(self.height)
    }
}

/// An identified region, supplied fresh for each query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedArea {
    pub id: String,
    pub bounds: BoundingBox,
}

impl NamedArea {
    pub fn new(id: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            id: id.into(),
            bounds,
        }
    }
}

/// First area in `areas` containing `position`.
pub fn hit_test(position: Position, areas: &[NamedArea]) -> Option<&NamedArea> {
    areas.iter().find(|area| area.bounds.contains(position))
}

/// Result of one hover query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HoverEvent {
    /// The pointer moved onto `id`.
    Enter { id: String },
    /// The pointer moved within `id`.
    Move { id: String },
    /// The pointer left `id` and is over no area.
    Leave { id: String },
    /// The pointer moved over no area.
    Motion,
}

/// Tracks which area the pointer is over.
#[derive(Debug, Clone, Default)]
pub struct HoverTracker {
    current: Option<String>,
}

impl HoverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the hover state for a pointer at `position`.
    ///
    /// Areas are tested in order and the first hit wins.
    pub fn process_hover(&mut self, position: Position, areas: &[NamedArea]) -> HoverEvent {
        match (hit_test(position, areas), self.current.take()) {
            (Some(hit), Some(current)) if hit.id == current => {
                self.current = Some(current);
                HoverEvent::Move { id: hit.id.clone() }
            }
            (Some(hit), _) => {
                self.current = Some(hit.id.clone());
                HoverEvent::Enter { id: hit.id.clone() }
            }
            (None, Some(previous)) => HoverEvent::Leave { id: previous },
            (None, None) => HoverEvent::Motion,
        }
    }

    #[inline]
    pub fn is_hovering(&self) -> bool {
        self.current.is_some()
    }

    #[inline]
    pub fn current_hover(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// Where to draw a `menu_width` x `menu_height` popup opened at `cursor`.
///
/// Each axis is shifted back independently when the menu would overflow
/// the screen, and pinned to `0` when the menu is larger than the screen.
pub fn calculate_menu_position(
    cursor: Position,
    menu_width: i32,
    menu_height: i32,
    screen_width: i32,
    screen_height: i32,
) -> Position {
    Position::new(
        fit_axis(cursor.x, menu_width, screen_width),
        fit_axis(cursor.y, menu_height, screen_height),
    )
}

fn fit_axis(start: i32, size: i32, screen: i32) -> i32 {
    let start = if start.saturating_add(size) > screen {
        screen.saturating_sub(size)
    } else {
        start
    };
    start.max(0)
}

/// Offset of a drag from its press position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DragDelta {
    pub dx: i32,
    pub dy: i32,
}

/// A motion report from an active drag.
#[derive(Debug, PartialEq, Eq)]
pub struct DragMotion<'a, T> {
    pub delta: DragDelta,
    pub baseline: &'a T,
    /// Set on the first motion that crossed the threshold.
    pub started: bool,
}

/// How a press ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragOutcome<T> {
    pub baseline: T,
    pub delta: DragDelta,
    /// Whether the pointer moved far enough to count as a drag.
    pub dragged: bool,
}

#[derive(Debug, Clone)]
struct DragState<T> {
    origin: Position,
    baseline: T,
    active: bool,
}

/// Follows a press-move-release gesture for one button.
///
/// The caller supplies a baseline on press (typically the dragged item's
/// position or value) and applies each reported delta to it.
#[derive(Debug, Clone)]
pub struct DragTracker<T> {
    button: MouseButton,
    threshold: u16,
    state: Option<DragState<T>>,
}

impl<T> DragTracker<T> {
    pub fn new(button: MouseButton) -> Self {
        Self {
            button,
            threshold: 0,
            state: None,
        }
    }

    /// Cells the pointer must travel before motion counts as a drag.
    pub fn with_threshold(mut self, threshold: u16) -> Self {
        self.threshold = threshold;
        self
    }

    /// Start tracking if `button` is the tracked button. Returns whether it
    /// was.
    pub fn press(&mut self, button: MouseButton, position: Position, baseline: T) -> bool {
        if button != self.button {
            return false;
        }
        self.state = Some(DragState {
            origin: position,
            baseline,
            active: false,
        });
        true
    }

    /// Report the offset of `position` from the press position.
    ///
    /// Returns `None` when nothing is pressed or the threshold has not been
    /// crossed yet.
    pub fn motion(&mut self, position: Position) -> Option<DragMotion<'_, T>> {
        let threshold = u32::from(self.threshold);
        let state = self.state.as_mut()?;
        let started = !state.active && position.distance(state.origin) >= threshold;
        if started {
            state.active = true;
        }
        if !state.active {
            return None;
        }
        Some(DragMotion {
            delta: position.delta_from(state.origin),
            baseline: &state.baseline,
            started,
        })
    }

    /// Stop tracking. `MouseButton::None` (a release report that does not
    /// say which button) matches any button.
    pub fn release(&mut self, button: MouseButton, position: Position) -> Option<DragOutcome<T>> {
        if button != MouseButton::None && button != self.button {
            return None;
        }
        self.state.take().map(|state| DragOutcome {
            delta: position.delta_from(state.origin),
            dragged: state.active,
            baseline: state.baseline,
        })
    }

    /// Whether a press is being tracked.
    #[inline]
    pub fn is_pressed(&self) -> bool {
        self.state.is_some()
    }

    /// Whether a press has turned into a drag.
    #[inline]
    pub fn is_dragging(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.active)
    }

    pub fn origin(&self) -> Option<Position> {
        self.state.as_ref().map(|s| s.origin)
    }

    pub fn baseline(&self) -> Option<&T> {
        self.state.as_ref().map(|s| &s.baseline)
    }

    pub fn cancel(&mut self) {
        self.state = None;
    }
}

/// How many presses in quick succession a click completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClickCount {
    Single,
    Double,
    Triple,
}

impl ClickCount {
    fn next(self) -> Self {
        match self {
            ClickCount::Single => ClickCount::Double,
            ClickCount::Double => ClickCount::Triple,
            ClickCount::Triple => ClickCount::Single,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ClickCount::Single => 1,
            ClickCount::Double => 2,
            ClickCount::Triple => 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LastClick {
    button: MouseButton,
    position: Position,
    at: Instant,
    count: ClickCount,
}

/// Counts presses of the same button close together in time and space.
#[derive(Debug, Clone)]
pub struct ClickTracker {
    window: Duration,
    distance: u16,
    last: Option<LastClick>,
}

impl ClickTracker {
    pub fn new(window: Duration, distance: u16) -> Self {
        Self {
            window,
            distance,
            last: None,
        }
    }

    /// Register a press and return which click in the series it is.
    /// After a triple click the series starts over.
    pub fn register(&mut self, button: MouseButton, position: Position, now: Instant) -> ClickCount {
        let count = match self.last {
            Some(last)
                if last.button == button
                    && now.saturating_duration_since(last.at) <= self.window
                    && position.distance(last.position) <= u32::from(self.distance) =>
            {
                last.count.next()
            }
            _ => ClickCount::Single,
        };
        self.last = Some(LastClick {
            button,
            position,
            at: now,
            count,
        });
        count
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Tunables for [`MouseInteraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionConfig {
    /// Maximum gap between presses of a double or triple click.
    /// Default: 500 ms.
    pub multi_click_window: Duration,
    /// Maximum pointer travel between presses of a multi-click. Default: 1.
    pub multi_click_distance: u16,
    /// Travel before a press becomes a drag. Default: 0.
    pub drag_threshold: u16,
    /// Button that starts drags. Default: left.
    pub drag_button: MouseButton,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            multi_click_window: Duration::from_millis(500),
            multi_click_distance: 1,
            drag_threshold: 0,
            drag_button: MouseButton::Left,
        }
    }
}

/// A higher-level pointer event, delivered as [`Msg::Interaction`].
///
/// `target` is the id of the area under the press that started the gesture.
///
/// [`Msg::Interaction`]: crate::event::Msg::Interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Hover(HoverEvent),
    Click {
        target: Option<String>,
        button: MouseButton,
        position: Position,
        count: ClickCount,
    },
    DragStart {
        target: Option<String>,
        origin: Position,
    },
    Drag {
        target: Option<String>,
        position: Position,
        delta: DragDelta,
    },
    DragEnd {
        target: Option<String>,
        position: Position,
        delta: DragDelta,
    },
}

/// Hover, click and drag tracking driven by raw mouse reports.
#[derive(Debug, Clone)]
pub struct MouseInteraction {
    hover: HoverTracker,
    clicks: ClickTracker,
    drag: DragTracker<Option<String>>,
}

impl MouseInteraction {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            hover: HoverTracker::new(),
            clicks: ClickTracker::new(config.multi_click_window, config.multi_click_distance),
            drag: DragTracker::new(config.drag_button).with_threshold(config.drag_threshold),
        }
    }

    #[inline]
    pub fn hover(&self) -> &HoverTracker {
        &self.hover
    }

    #[inline]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    /// Feed one report. Idle motion over no area produces nothing.
    pub fn process(
        &mut self,
        event: &MouseEvent,
        areas: &[NamedArea],
        now: Instant,
    ) -> SmallVec<[Interaction; 4]> {
        let position = Position::from(event);
        let mut out = SmallVec::new();

        match self.hover.process_hover(position, areas) {
            HoverEvent::Motion => {}
            hover => out.push(Interaction::Hover(hover)),
        }

        if event.is_wheel() {
            return out;
        }

        match event.action {
            MouseAction::Press if event.button != MouseButton::None => {
                let target = hit_test(position, areas).map(|area| area.id.clone());
                let count = self.clicks.register(event.button, position, now);
                self.drag.press(event.button, position, target.clone());
                out.push(Interaction::Click {
                    target,
                    button: event.button,
                    position,
                    count,
                });
            }
            MouseAction::Motion => {
                let origin = self.drag.origin();
                if let Some(motion) = self.drag.motion(position) {
                    let target = motion.baseline.clone();
                    if let (true, Some(origin)) = (motion.started, origin) {
                        out.push(Interaction::DragStart {
                            target: target.clone(),
                            origin,
                        });
                    }
                    out.push(Interaction::Drag {
                        target,
                        position,
                        delta: motion.delta,
                    });
                }
            }
            MouseAction::Release => {
                if let Some(outcome) = self.drag.release(event.button, position) {
                    if outcome.dragged {
                        out.push(Interaction::DragEnd {
                            target: outcome.baseline,
                            position,
                            delta: outcome.delta,
                        });
                    }
                }
            }
            MouseAction::Press => {}
        }

        out
    }

    pub fn reset(&mut self) {
        self.hover.reset();
        self.clicks.reset();
        self.drag.cancel();
    }
}

impl Default for MouseInteraction {
    fn default() -> Self {
        Self::new(InteractionConfig::default())
    }
}
