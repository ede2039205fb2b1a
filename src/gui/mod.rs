//! A single fixed-size window showing an image.
//!
//! [`Window`] is backed by a CPU-side [`Canvas`]: images are blitted onto the canvas, and
//! [`Screen::present`] uploads the canvas to the GPU and shows it. The canvas keeps its contents
//! between presents, so the window keeps showing the last image until a new one is blitted.

mod renderer;

use anyhow::Context;
use winit::{
    dpi::PhysicalSize,
    event::{Event as WinitEvent, WindowEvent},
    event_loop::EventLoop,
    platform::run_return::EventLoopExtRunReturn,
    window::WindowBuilder,
};

use crate::image::{Color, Image, Resolution};

use self::renderer::Renderer;

/// Input events relevant to the display loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Event {
    /// The user asked to close the window.
    CloseRequested,
}

/// A display surface that images can be drawn to.
pub trait Screen {
    /// Returns all events that arrived since the last call, without blocking.
    fn poll_events(&mut self) -> Vec<Event>;

    /// Copies `image` onto the screen contents at the origin, overwriting what was there.
    fn blit(&mut self, image: &Image);

    /// Shows the current contents.
    fn present(&mut self) -> anyhow::Result<()>;

    /// Tears down the screen.
    fn quit(self)
    where
        Self: Sized;
}

/// The CPU-side contents of a window.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: Image,
    dirty: bool,
}

impl Canvas {
    /// Creates an opaque black canvas.
    pub fn new(res: Resolution) -> Self {
        let mut image = Image::new(res.width(), res.height());
        image.clear(Color::BLACK);
        Self { image, dirty: true }
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.image.resolution()
    }

    /// Copies `image` onto the canvas, placing its top left corner at the canvas origin.
    ///
    /// Parts of `image` outside of the canvas are clipped. Parts of the canvas not covered by
    /// `image` keep their contents.
    pub fn blit(&mut self, image: &Image) {
        self.image.blit(image, 0, 0);
        self.dirty = true;
    }

    /// Returns the current contents of the canvas.
    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Returns whether anything has been drawn since the last call to [`Canvas::take_dirty`], and
    /// resets the flag.
    fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

/// A native, non-resizable window.
pub struct Window {
    canvas: Canvas,
    renderer: Renderer,
    /// Must be dropped after the window, which is owned by `renderer`.
    event_loop: EventLoop<()>,
}

impl Window {
    /// Opens a window with the given title and inner size.
    pub fn open(title: &str, resolution: Resolution) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new();
        let win = WindowBuilder::new()
            .with_resizable(false)
            .with_inner_size(PhysicalSize::new(resolution.width(), resolution.height()))
            .with_title(title)
            .build(&event_loop)
            .context("failed to create window")?;

        log::info!("opened {} window '{}'", resolution, title);

        let renderer = pollster::block_on(Renderer::new(win, resolution))?;
        Ok(Self {
            canvas: Canvas::new(resolution),
            renderer,
            event_loop,
        })
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.canvas.resolution()
    }
}

impl Screen for Window {
    fn poll_events(&mut self) -> Vec<Event> {
        let win_id = self.renderer.window().id();
        let mut events = Vec::new();

        // Pump the event loop until it has nothing left to deliver.
        self.event_loop.run_return(|event, _target, flow| {
            flow.set_poll();
            match event {
                WinitEvent::WindowEvent {
                    window_id,
                    event: WindowEvent::CloseRequested,
                } if window_id == win_id => {
                    events.push(Event::CloseRequested);
                }
                WinitEvent::MainEventsCleared => flow.set_exit(),
                _ => {}
            }
        });

        events
    }

    fn blit(&mut self, image: &Image) {
        self.canvas.blit(image);
    }

    fn present(&mut self) -> anyhow::Result<()> {
        if self.canvas.take_dirty() {
            self.renderer.update_texture(self.canvas.image());
        }
        self.renderer.redraw()
    }

    fn quit(self) {
        log::debug!("closing window");
        drop(self.renderer);
        drop(self.event_loop);
    }
}
