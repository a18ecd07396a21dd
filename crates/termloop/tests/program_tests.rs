//! End-to-end tests driving a program from scripted input bytes.

use std::io::{self, Write};
use std::time::Duration;

use termloop::testing::{CaptureWriter, RecordingControl, Transition};
use termloop::{
    command, BoundingBox, ClickCount, Command, HoverEvent, Interaction, Key, KeyCode, Model,
    MouseButton, Msg, NamedArea, Position, ProgramBuilder, ProgramError, WindowSize,
};

/// Records everything it sees and quits on `q`.
#[derive(Debug, Default)]
struct Log {
    keys: Vec<Key>,
    interactions: Vec<Interaction>,
    sizes: Vec<WindowSize>,
    custom: Vec<u32>,
    areas: bool,
}

impl Model for Log {
    fn update(mut self, msg: Msg) -> (Self, Option<Command>) {
        match msg {
            Msg::Key(key) if key.code == KeyCode::Char('q') => return (self, Some(command::quit())),
            Msg::Key(key) if key.code == KeyCode::Char('b') => {
                let cmd = command::batch([
                    Some(Command::new(|| Msg::custom(1u32))),
                    Some(Command::new(|| Msg::custom(2u32))),
                ]);
                self.keys.push(key);
                return (self, cmd);
            }
            Msg::Key(key) => self.keys.push(key),
            Msg::Interaction(interaction) => self.interactions.push(interaction),
            Msg::Resize(size) => self.sizes.push(size),
            Msg::Custom(_) => {
                if let Some(n) = msg.downcast_ref::<u32>() {
                    self.custom.push(*n);
                    if self.custom.len() == 2 {
                        return (self, Some(command::quit()));
                    }
                }
            }
            _ => {}
        }
        (self, None)
    }

    fn view(&self) -> String {
        format!("keys: {}", self.keys.len())
    }

    fn hit_areas(&self) -> Vec<NamedArea> {
        if self.areas {
            vec![NamedArea::new("button", BoundingBox::new(0, 0, 10, 3))]
        } else {
            Vec::new()
        }
    }
}

fn program_with_input(model: Log, input: &'static [u8]) -> (ProgramBuilder<Log>, CaptureWriter) {
    let output = CaptureWriter::new();
    let builder = ProgramBuilder::new()
        .model(model)
        .input(input)
        .output(output.clone())
        .terminal_control(RecordingControl::with_size(WindowSize::new(100, 40)))
        .resize_signals(false);
    (builder, output)
}

#[test]
fn test_keys_are_delivered_in_order() {
    let (builder, output) = program_with_input(Log::default(), b"ax\x1b[A\rq");
    let model = builder.build().unwrap().run().unwrap();

    assert_eq!(
        model.keys,
        vec![
            Key::new(KeyCode::Char('a')),
            Key::new(KeyCode::Char('x')),
            Key::new(KeyCode::Up),
            Key::new(KeyCode::Enter),
        ]
    );
    assert_eq!(model.sizes, vec![WindowSize::new(100, 40)]);
    assert!(output.output().contains("keys: 4"));
}

#[test]
fn test_end_of_input_is_an_error() {
    let (builder, _) = program_with_input(Log::default(), b"abc");
    assert!(matches!(
        builder.build().unwrap().run(),
        Err(ProgramError::InputClosed)
    ));
}

#[test]
fn test_interrupt_byte_quits() {
    let (builder, _) = program_with_input(Log::default(), b"a\x03b");
    let model = builder.build().unwrap().run().unwrap();
    assert_eq!(model.keys, vec![Key::new(KeyCode::Char('a'))]);
}

#[test]
fn test_batch_results_reach_update() {
    let output = CaptureWriter::new();
    let mut program = ProgramBuilder::new()
        .model(Log::default())
        .without_input()
        .output(output)
        .terminal_control(RecordingControl::new())
        .resize_signals(false)
        .build()
        .unwrap();

    program.start().unwrap();
    program.send(Key::new(KeyCode::Char('b'))).unwrap();
    program.wait().unwrap();

    let mut custom = program.into_model().unwrap().custom;
    custom.sort_unstable();
    assert_eq!(custom, vec![1, 2]);
}

#[test]
fn test_sender_from_another_thread() {
    let mut program = ProgramBuilder::new()
        .model(Log::default())
        .without_input()
        .output(CaptureWriter::new())
        .terminal_control(RecordingControl::new())
        .resize_signals(false)
        .build()
        .unwrap();
    program.start().unwrap();

    let sender = program.sender();
    std::thread::spawn(move || {
        sender.send(Key::new(KeyCode::Char('x'))).unwrap();
        sender.send(Key::new(KeyCode::Char('q'))).unwrap();
    })
    .join()
    .unwrap();

    program.wait().unwrap();
    assert!(!program.sender().is_running());
    assert_eq!(program.into_model().unwrap().keys, vec![Key::new(KeyCode::Char('x'))]);
}

#[test]
fn test_tick_result_is_delivered() {
    struct Ticker(Option<Duration>);

    impl Model for Ticker {
        fn init(&self) -> Option<Command> {
            Some(command::tick(Duration::from_millis(10), |_| Msg::custom("tick")))
        }

        fn update(self, msg: Msg) -> (Self, Option<Command>) {
            if msg.downcast_ref::<&'static str>().is_some() {
                return (Ticker(Some(Duration::from_millis(10))), Some(command::quit()));
            }
            (self, None)
        }

        fn view(&self) -> String {
            String::new()
        }
    }

    let model = ProgramBuilder::new()
        .model(Ticker(None))
        .without_input()
        .output(CaptureWriter::new())
        .terminal_control(RecordingControl::new())
        .resize_signals(false)
        .build()
        .unwrap()
        .run()
        .unwrap();
    assert!(model.0.is_some());
}

#[test]
fn test_click_on_named_area() {
    let model = Log {
        areas: true,
        ..Log::default()
    };
    // press and release at column 3, row 2 (1-based)
    let (builder, _) = program_with_input(model, b"\x1b[<0;3;2M\x1b[<0;3;2mq");
    let model = builder.build().unwrap().run().unwrap();

    assert_eq!(
        model.interactions,
        vec![
            Interaction::Hover(HoverEvent::Enter {
                id: "button".to_string()
            }),
            Interaction::Click {
                target: Some("button".to_string()),
                button: MouseButton::Left,
                position: Position::new(2, 1),
                count: ClickCount::Single,
            },
            Interaction::Hover(HoverEvent::Move {
                id: "button".to_string()
            }),
        ]
    );
}

#[test]
fn test_drag_from_named_area() {
    let model = Log {
        areas: true,
        ..Log::default()
    };
    let (builder, _) =
        program_with_input(model, b"\x1b[<0;3;2M\x1b[<32;6;2M\x1b[<0;20;2mq");
    let model = builder.build().unwrap().run().unwrap();

    let drags: Vec<_> = model
        .interactions
        .into_iter()
        .filter(|i| !matches!(i, Interaction::Hover(_) | Interaction::Click { .. }))
        .collect();
    assert_eq!(drags.len(), 3, "{drags:?}");
    assert!(matches!(
        &drags[0],
        Interaction::DragStart { target: Some(id), origin } if id == "button" && *origin == Position::new(2, 1)
    ));
    assert!(matches!(
        &drags[1],
        Interaction::Drag { delta, .. } if delta.dx == 3 && delta.dy == 0
    ));
    assert!(matches!(
        &drags[2],
        Interaction::DragEnd { target: Some(id), delta, .. } if id == "button" && delta.dx == 17
    ));
}

#[test]
fn test_mouse_without_areas_has_no_interactions() {
    let (builder, _) = program_with_input(Log::default(), b"\x1b[<0;3;2Mq");
    let model = builder.build().unwrap().run().unwrap();
    assert!(model.interactions.is_empty());
}

#[test]
fn test_modes_restored_after_run() {
    let control = RecordingControl::new();
    ProgramBuilder::new()
        .model(Log::default())
        .input(&b"q"[..])
        .output(CaptureWriter::new())
        .terminal_control(control.clone())
        .alt_screen(true)
        .mouse_cell_motion()
        .resize_signals(false)
        .build()
        .unwrap()
        .run()
        .unwrap();

    let transitions = control.transitions();
    assert_eq!(transitions.first(), Some(&Transition::EnterAltScreen));
    assert_eq!(transitions.last(), Some(&Transition::ShowCursor));
    assert!(transitions.contains(&Transition::DisableMouse));
    assert!(transitions.contains(&Transition::ExitAltScreen));
    assert!(!transitions.contains(&Transition::EnableRawMode));
}

/// Output that refuses every write.
struct ClosedOutput;

impl Write for ClosedOutput {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::ErrorKind::BrokenPipe.into())
    }
}

#[test]
fn test_render_failure_is_fatal_and_restores_modes() {
    let control = RecordingControl::new();
    let result = ProgramBuilder::new()
        .model(Log::default())
        .without_input()
        .output(ClosedOutput)
        .terminal_control(control.clone())
        .alt_screen(true)
        .mouse_cell_motion()
        .resize_signals(false)
        .build()
        .unwrap()
        .run();

    assert!(matches!(result, Err(ProgramError::Render(ref err)) if err.kind() == io::ErrorKind::BrokenPipe));
    assert_eq!(
        control.transitions(),
        vec![
            Transition::EnterAltScreen,
            Transition::HideCursor,
            Transition::EnableMouse(termloop::MouseTracking::CellMotion),
            Transition::DisableMouse,
            Transition::ExitAltScreen,
            Transition::ShowCursor,
        ]
    );
}
