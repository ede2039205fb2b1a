use std::{cell::RefCell, rc::Rc, time::Duration};

use camview::{
    clock::Limiter,
    display_loop::{DisplayLoop, Stats},
    gui::{Canvas, Event, Screen},
    image::{Color, Frame, Image, Resolution},
    transform::{ArrayLayout, FrameTransform},
    video::FrameSource,
    Config,
};

const FRAME_RES: Resolution = Resolution::new(4, 3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Poll,
    Read,
    Blit,
    Present,
    Tick,
    Release,
    Quit,
}

/// Everything the fakes observe, shared between them.
#[derive(Default)]
struct Record {
    calls: Vec<Call>,
    /// Screen contents at every `present`.
    presented: Vec<Image>,
}

type Shared = Rc<RefCell<Record>>;

impl Record {
    fn count(&self, call: Call) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }
}

struct ScriptedSource {
    record: Shared,
    resolution: Resolution,
    script: Vec<Option<Frame>>,
}

impl FrameSource for ScriptedSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn read(&mut self) -> Option<Frame> {
        self.record.borrow_mut().calls.push(Call::Read);
        if self.script.is_empty() {
            None
        } else {
            self.script.remove(0)
        }
    }

    fn release(self) {
        self.record.borrow_mut().calls.push(Call::Release);
    }
}

struct FakeScreen {
    record: Shared,
    canvas: Canvas,
    polls: usize,
    /// 1-based iteration whose event poll reports a close request.
    close_on: usize,
}

impl Screen for FakeScreen {
    fn poll_events(&mut self) -> Vec<Event> {
        self.record.borrow_mut().calls.push(Call::Poll);
        self.polls += 1;
        if self.polls == self.close_on {
            vec![Event::CloseRequested]
        } else {
            Vec::new()
        }
    }

    fn blit(&mut self, image: &Image) {
        self.record.borrow_mut().calls.push(Call::Blit);
        self.canvas.blit(image);
    }

    fn present(&mut self) -> anyhow::Result<()> {
        let mut record = self.record.borrow_mut();
        record.calls.push(Call::Present);
        record.presented.push(self.canvas.image().clone());
        Ok(())
    }

    fn quit(self) {
        self.record.borrow_mut().calls.push(Call::Quit);
    }
}

struct CountingLimiter(Shared);

impl Limiter for CountingLimiter {
    fn tick(&mut self) -> Duration {
        self.0.borrow_mut().calls.push(Call::Tick);
        Duration::ZERO
    }
}

fn frame(seed: u8) -> Frame {
    let data = (0..FRAME_RES.num_pixels() as u8 * 3)
        .map(|i| i.wrapping_mul(7).wrapping_add(seed))
        .collect();
    Frame::from_bgr8(FRAME_RES, data)
}

fn random_frame() -> Frame {
    let data = (0..FRAME_RES.num_pixels() * 3).map(|_| fastrand::u8(..)).collect();
    Frame::from_bgr8(FRAME_RES, data)
}

fn run(script: Vec<Option<Frame>>, close_on: usize) -> (Stats, Record) {
    let transform = FrameTransform::new(ArrayLayout::RowMajor);
    run_in_window(
        transform,
        transform.output_resolution(FRAME_RES),
        FRAME_RES,
        script,
        close_on,
    )
}

fn run_in_window(
    transform: FrameTransform,
    window: Resolution,
    frame_res: Resolution,
    script: Vec<Option<Frame>>,
    close_on: usize,
) -> (Stats, Record) {
    let record = Shared::default();
    let source = ScriptedSource {
        record: record.clone(),
        resolution: frame_res,
        script,
    };
    let screen = FakeScreen {
        record: record.clone(),
        canvas: Canvas::new(window),
        polls: 0,
        close_on,
    };
    let limiter = CountingLimiter(record.clone());

    let stats = DisplayLoop::new(source, screen, limiter, transform)
        .run()
        .unwrap();
    let record = Rc::try_unwrap(record)
        .ok()
        .expect("fakes were not dropped")
        .into_inner();
    (stats, record)
}

fn blank() -> Image {
    Canvas::new(FRAME_RES.transposed()).image().clone()
}

#[test]
fn close_during_successful_iteration_still_renders() {
    let script = (1..=10).map(|i| Some(frame(i))).collect();
    let (stats, record) = run(script, 5);

    assert_eq!(
        stats,
        Stats {
            iterations: 5,
            rendered: 5,
            skipped: 0,
        }
    );
    assert_eq!(record.count(Call::Read), 5);
    assert_eq!(record.count(Call::Blit), 5);

    // The 5th iteration shows the 5th frame, and nothing happens afterwards except teardown.
    let expected = FrameTransform::new(ArrayLayout::RowMajor).apply(&frame(5));
    assert_eq!(record.presented.last(), Some(&expected));
    assert_eq!(
        &record.calls[record.calls.len() - 7..],
        &[
            Call::Poll,
            Call::Read,
            Call::Blit,
            Call::Present,
            Call::Tick,
            Call::Release,
            Call::Quit,
        ]
    );
}

#[test]
fn failed_reads_keep_last_frame() {
    let script = vec![Some(frame(1)), None, None, Some(frame(2)), None];
    let (stats, record) = run(script, 5);

    assert_eq!(
        stats,
        Stats {
            iterations: 5,
            rendered: 2,
            skipped: 3,
        }
    );
    assert_eq!(record.count(Call::Blit), 2);

    let transform = FrameTransform::new(ArrayLayout::RowMajor);
    let first = transform.apply(&frame(1));
    let second = transform.apply(&frame(2));
    assert_eq!(
        record.presented,
        [first.clone(), first.clone(), first, second.clone(), second]
    );
}

#[test]
fn device_that_never_delivers() {
    let (stats, record) = run(Vec::new(), 100);

    assert_eq!(
        stats,
        Stats {
            iterations: 100,
            rendered: 0,
            skipped: 100,
        }
    );
    assert_eq!(record.count(Call::Blit), 0);
    assert_eq!(record.count(Call::Tick), 100);
    assert_eq!(record.presented.len(), 100);
    assert!(record.presented.iter().all(|image| *image == blank()));
    assert!(record.presented[0].data().chunks(4).all(|px| px == [0, 0, 0, 255]));
}

#[test]
fn teardown_happens_once_after_the_loop() {
    let script = vec![None, Some(frame(3)), None, None];
    let (_, record) = run(script, 4);

    assert_eq!(record.count(Call::Release), 1);
    assert_eq!(record.count(Call::Quit), 1);

    let last_tick = record
        .calls
        .iter()
        .rposition(|c| *c == Call::Tick)
        .unwrap();
    let release = record
        .calls
        .iter()
        .position(|c| *c == Call::Release)
        .unwrap();
    assert!(release > last_tick);
    assert_eq!(record.calls.len(), release + 2);
}

#[test]
fn every_iteration_is_rate_limited() {
    let script = vec![Some(frame(1)), None, Some(frame(2))];
    let (_, record) = run(script, 7);

    assert_eq!(record.count(Call::Tick), 7);
    assert_eq!(record.count(Call::Poll), 7);
    // Each iteration ends with present + tick.
    for window in record.calls.split(|c| *c == Call::Tick).filter(|w| !w.is_empty()) {
        if window.contains(&Call::Release) {
            continue;
        }
        assert_eq!(window.first(), Some(&Call::Poll));
        assert_eq!(window.last(), Some(&Call::Present));
    }
}

#[test]
fn displayed_image_is_rotated_and_mirrored() {
    let input = random_frame();
    let (_, record) = run(vec![Some(input.clone())], 1);
    let shown = &record.presented[0];

    // The shown image has the frame's rows as columns, flipped both ways.
    assert_eq!(shown.resolution(), FRAME_RES.transposed());
    for y in 0..FRAME_RES.height() {
        for x in 0..FRAME_RES.width() {
            let [b, g, r] = input.get(x, y);
            assert_eq!(
                shown.get(FRAME_RES.height() - 1 - y, FRAME_RES.width() - 1 - x),
                Color::from_rgb8(r, g, b),
            );
        }
    }
}

#[test]
fn default_config_fills_the_window() {
    let config = Config::default();
    let res = config.capture_resolution();
    let white = Frame::from_bgr8(res, vec![255; res.num_pixels() as usize * 3]);

    let (stats, record) = run_in_window(
        FrameTransform::new(config.layout()),
        config.window_resolution(),
        res,
        vec![Some(white)],
        1,
    );
    assert_eq!(stats.rendered, 1);

    let shown = &record.presented[0];
    assert_eq!(shown.resolution(), config.window_resolution());
    let unwritten = shown
        .data()
        .chunks(4)
        .filter(|px| *px != [255, 255, 255, 255])
        .count();
    assert_eq!(unwritten, 0, "{unwritten} window pixels were not overwritten");
}

#[test]
fn default_layout_shows_frames_upright() {
    let input = random_frame();
    let (_, record) = run_in_window(
        FrameTransform::default(),
        FRAME_RES,
        FRAME_RES,
        vec![Some(input.clone())],
        1,
    );
    let shown = &record.presented[0];

    assert_eq!(shown.resolution(), FRAME_RES);
    for y in 0..FRAME_RES.height() {
        for x in 0..FRAME_RES.width() {
            let [b, g, r] = input.get(x, y);
            assert_eq!(shown.get(x, y), Color::from_rgb8(r, g, b));
        }
    }
}
