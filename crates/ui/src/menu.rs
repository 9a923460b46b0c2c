//! Scrollable menus
//!
//! One item is visible per display row starting at the scroll position.
//! Left and right move the scroll, action activates the item at the top.

use crate::display::Glyph;
use crate::input::{Button, ButtonEvent, PressKind};
use crate::page::{EventResult, Page, PageContext, PageId};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub type MenuAction = Arc<dyn Fn(PageContext) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone)]
enum Target {
    None,
    Page(Arc<dyn Page>),
    Action(MenuAction),
    Back,
}

#[derive(Clone)]
pub struct MenuItem {
    caption: String,
    target: Target,
}

impl MenuItem {
    /// Caption only, nothing happens on activation
    pub fn info(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            target: Target::None,
        }
    }

    pub fn page(caption: impl Into<String>, page: Arc<dyn Page>) -> Self {
        Self {
            caption: caption.into(),
            target: Target::Page(page),
        }
    }

    /// Item that spawns `action` when activated
    pub fn action<F, Fut>(caption: impl Into<String>, action: F) -> Self
    where
        F: Fn(PageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action: MenuAction = Arc::new(move |ctx| Box::pin(action(ctx)));
        Self {
            caption: caption.into(),
            target: Target::Action(action),
        }
    }

    /// Item that closes the menu's page
    pub fn back() -> Self {
        Self {
            caption: "Back".to_string(),
            target: Target::Back,
        }
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self.target, Target::None)
    }
}

#[derive(Default)]
struct MenuState {
    items: Vec<MenuItem>,
    scroll: usize,
}

impl MenuState {
    fn clamp(&mut self) {
        self.scroll = self.scroll.min(self.items.len().saturating_sub(1));
    }
}

/// Ordered items plus a scroll position kept in `0..len`
#[derive(Default)]
pub struct Menu {
    state: Mutex<MenuState>,
}

impl Menu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<MenuItem>) -> Self {
        let menu = Self::new();
        menu.set_items(items);
        menu
    }

    fn state(&self) -> MutexGuard<'_, MenuState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace every item, keeping the scroll position where possible
    pub fn set_items(&self, items: Vec<MenuItem>) {
        let mut state = self.state();
        state.items = items;
        state.clamp();
    }

    pub fn clear(&self) {
        self.set_items(Vec::new());
    }

    pub fn push(&self, item: MenuItem) {
        self.state().items.push(item);
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().items.is_empty()
    }

    pub fn captions(&self) -> Vec<String> {
        self.state()
            .items
            .iter()
            .map(|item| item.caption.clone())
            .collect()
    }

    pub fn scroll(&self) -> usize {
        self.state().scroll
    }

    pub fn reset_scroll(&self) {
        self.state().scroll = 0;
    }

    /// Move one item up, returning whether the position changed
    pub fn scroll_up(&self) -> bool {
        let mut state = self.state();
        if state.scroll == 0 {
            return false;
        }
        state.scroll -= 1;
        true
    }

    /// Move one item down, returning whether the position changed
    pub fn scroll_down(&self) -> bool {
        let mut state = self.state();
        if state.scroll + 1 >= state.items.len() {
            return false;
        }
        state.scroll += 1;
        true
    }

    pub fn selected(&self) -> Option<MenuItem> {
        let state = self.state();
        state.items.get(state.scroll).cloned()
    }

    /// Reset the scroll and draw
    pub async fn open(&self, ctx: &PageContext) {
        self.reset_scroll();
        self.show(ctx).await;
    }

    /// Draw the visible window
    pub async fn show(&self, ctx: &PageContext) {
        let (columns, rows) = (ctx.columns(), ctx.rows());
        let (visible, scroll, count, indicator) = {
            let state = self.state();
            let visible: Vec<(String, bool)> = state
                .items
                .iter()
                .skip(state.scroll)
                .take(rows)
                .map(|item| (item.caption.clone(), item.is_actionable()))
                .collect();
            let indicator = state.items.iter().any(MenuItem::is_actionable);
            (visible, state.scroll, state.items.len(), indicator)
        };

        ctx.stop_progress();
        let Some(mut display) = ctx.display().await else {
            return;
        };
        display.clear();

        for (row, (caption, actionable)) in visible.iter().enumerate() {
            let line = if !indicator {
                caption.clone()
            } else if row > 0 {
                format!(" {}", caption)
            } else if *actionable {
                format!("{}{}", Glyph::SelectedPage, caption)
            } else {
                format!("{}{}", Glyph::SelectedItem, caption)
            };
            display.write_at(0, row, &ctx.pad(&line));
        }

        if scroll > 0 {
            display.write_at(columns.saturating_sub(1), 0, &Glyph::ArrowUp.to_string());
        }
        if scroll + 1 < count {
            display.write_at(
                columns.saturating_sub(1),
                rows.saturating_sub(1),
                &Glyph::ArrowDown.to_string(),
            );
        }
    }

    pub async fn handle_button(
        &self,
        ctx: &PageContext,
        event: ButtonEvent,
    ) -> anyhow::Result<EventResult> {
        if event.kind != PressKind::Press {
            return Ok(EventResult::Ignored);
        }

        match event.button {
            Button::Left => {
                if !self.scroll_up() {
                    return Ok(EventResult::Ignored);
                }
                self.show(ctx).await;
            }
            Button::Right => {
                if !self.scroll_down() {
                    return Ok(EventResult::Ignored);
                }
                self.show(ctx).await;
            }
            Button::Action => {
                let Some(item) = self.selected() else {
                    return Ok(EventResult::Ignored);
                };
                match item.target {
                    Target::None => return Ok(EventResult::Ignored),
                    Target::Page(page) => ctx.open_page(page)?,
                    Target::Back => ctx.close_page()?,
                    Target::Action(action) => {
                        debug!("Menu '{}' running '{}'", ctx.page(), item.caption);
                        tokio::spawn(action(ctx.clone()));
                    }
                }
            }
        }

        Ok(EventResult::Handled)
    }
}

/// Page showing a fixed menu
pub struct MenuPage {
    name: PageId,
    menu: Menu,
}

impl MenuPage {
    pub fn new(name: PageId, items: Vec<MenuItem>) -> Self {
        Self {
            name,
            menu: Menu::with_items(items),
        }
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }
}

#[async_trait]
impl Page for MenuPage {
    fn name(&self) -> PageId {
        self.name
    }

    fn auto_refresh(&self) -> bool {
        false
    }

    async fn on_open(&self, ctx: &PageContext) -> anyhow::Result<()> {
        self.menu.open(ctx).await;
        Ok(())
    }

    async fn on_button(&self, ctx: &PageContext, event: ButtonEvent) -> anyhow::Result<EventResult> {
        self.menu.handle_button(ctx, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn items(count: usize) -> Vec<MenuItem> {
        (0..count).map(|i| MenuItem::info(format!("item {}", i))).collect()
    }

    #[test]
    fn test_scroll_stops_at_edges() {
        let menu = Menu::with_items(items(3));

        assert!(!menu.scroll_up());
        assert!(menu.scroll_down());
        assert!(menu.scroll_down());
        assert!(!menu.scroll_down());
        assert_eq!(menu.scroll(), 2);
    }

    #[test]
    fn test_shrinking_items_clamps_scroll() {
        let menu = Menu::with_items(items(5));
        while menu.scroll_down() {}
        assert_eq!(menu.scroll(), 4);

        menu.set_items(items(2));
        assert_eq!(menu.scroll(), 1);

        menu.clear();
        assert_eq!(menu.scroll(), 0);
        assert!(menu.selected().is_none());
    }

    #[test]
    fn test_actionable_items() {
        assert!(!MenuItem::info("x").is_actionable());
        assert!(MenuItem::back().is_actionable());
        assert!(MenuItem::action("y", |_ctx| async {}).is_actionable());
    }

    proptest! {
        #[test]
        fn test_scroll_never_leaves_items(count in 1usize..20, moves in proptest::collection::vec(any::<bool>(), 0..100)) {
            let menu = Menu::with_items(items(count));
            for right in moves {
                if right {
                    menu.scroll_down();
                } else {
                    menu.scroll_up();
                }
                prop_assert!(menu.scroll() < count);
            }
        }

        #[test]
        fn test_rebuild_keeps_scroll_in_range(first in 1usize..20, second in 1usize..20, downs in 0usize..30) {
            let menu = Menu::with_items(items(first));
            for _ in 0..downs {
                menu.scroll_down();
            }
            menu.set_items(items(second));
            prop_assert!(menu.scroll() < second);
        }
    }
}
