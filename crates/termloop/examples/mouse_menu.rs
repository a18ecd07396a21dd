//! Mouse interaction example.
//!
//! Draws a row of buttons. Hovering highlights a button, clicking selects
//! it, double-clicking opens a context menu placed next to the pointer so it
//! stays on screen, and dragging a button shows the offset.
//!
//! Press q or Ctrl+C to quit. Set `TERMLOOP_LOG=path` to write trace logs
//! to a file.

use std::fs::File;
use std::sync::Arc;

use termloop::{
    calculate_menu_position, command, BoundingBox, ClickCount, Command, HoverEvent, Interaction,
    KeyCode, Model, Msg, NamedArea, Position, ProgramBuilder, WindowSize,
};
use tracing_subscriber::EnvFilter;

const BUTTONS: [&str; 3] = ["alpha", "beta", "gamma"];
const BUTTON_WIDTH: i32 = 9;
const MENU_WIDTH: i32 = 14;
const MENU_HEIGHT: i32 = 3;

#[derive(Default)]
struct Menu {
    size: Option<WindowSize>,
    hovered: Option<String>,
    selected: Option<String>,
    menu: Option<(Position, String)>,
    drag: Option<(String, i32, i32)>,
}

impl Menu {
    fn button_bounds(index: usize) -> BoundingBox {
        let x = 1 + (BUTTON_WIDTH + 1) * index as i32;
        BoundingBox::new(x, 1, BUTTON_WIDTH, 1)
    }

    fn interact(&mut self, interaction: Interaction) {
        match interaction {
            Interaction::Hover(HoverEvent::Enter { id } | HoverEvent::Move { id }) => {
                self.hovered = Some(id);
            }
            Interaction::Hover(HoverEvent::Leave { .. } | HoverEvent::Motion) => {
                self.hovered = None;
            }
            Interaction::Click {
                target: Some(id),
                position,
                count,
                ..
            } => {
                if count == ClickCount::Double {
                    let screen = self.size.unwrap_or(WindowSize::new(80, 24));
                    let at = calculate_menu_position(
                        position,
                        MENU_WIDTH,
                        MENU_HEIGHT,
                        i32::from(screen.width),
                        i32::from(screen.height),
                    );
                    self.menu = Some((at, id.clone()));
                }
                self.selected = Some(id);
            }
            Interaction::Click { target: None, .. } => self.menu = None,
            Interaction::DragStart { target: Some(id), .. } => self.drag = Some((id, 0, 0)),
            Interaction::Drag { delta, .. } => {
                if let Some((_, dx, dy)) = self.drag.as_mut() {
                    *dx = delta.dx;
                    *dy = delta.dy;
                }
            }
            Interaction::DragEnd { .. } => self.drag = None,
            _ => {}
        }
    }
}

impl Model for Menu {
    fn update(mut self, msg: Msg) -> (Self, Option<Command>) {
        match msg {
            Msg::Resize(size) => self.size = Some(size),
            Msg::Interaction(interaction) => self.interact(interaction),
            msg if msg.is_key(KeyCode::Char('q')) => return (self, Some(command::quit())),
            msg if msg.is_key(KeyCode::Esc) => self.menu = None,
            _ => {}
        }
        (self, None)
    }

    fn view(&self) -> String {
        let mut row = String::from(" ");
        for name in BUTTONS {
            let label = if self.hovered.as_deref() == Some(name) {
                format!("[{name:^7}]")
            } else {
                format!(" {name:^7} ")
            };
            row.push_str(&label);
            row.push(' ');
        }

        let mut lines = vec![String::new(), row, String::new()];
        lines.push(format!(
            "selected: {}",
            self.selected.as_deref().unwrap_or("-")
        ));
        if let Some((id, dx, dy)) = &self.drag {
            lines.push(format!("dragging {id} by ({dx}, {dy})"));
        }
        if let Some((at, id)) = &self.menu {
            lines.push(format!("menu for {id} at ({}, {})", at.x, at.y));
        }
        lines.push("double-click for a menu, drag to move, q to quit".to_string());
        lines.join("\n")
    }

    fn hit_areas(&self) -> Vec<NamedArea> {
        BUTTONS
            .iter()
            .enumerate()
            .map(|(i, name)| NamedArea::new(*name, Menu::button_bounds(i)))
            .collect()
    }
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let Ok(path) = std::env::var("TERMLOOP_LOG") else {
        return Ok(());
    };
    let file = File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("termloop=trace")),
        )
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    ProgramBuilder::new()
        .model(Menu::default())
        .alt_screen(true)
        .mouse_motion()
        .build()?
        .run()?;
    Ok(())
}
