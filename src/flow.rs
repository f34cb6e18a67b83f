//! Flow control and application event loop.
//!
//! A "flow" is a scene plugged into the event loop: it is constructed
//! asynchronously once the GPU context exists, receives window events, is
//! updated every frame and describes what to draw with a [`Render`].
//!
//! # Lifecycle Flow
//!
//! The event loop follows this pattern each frame:
//! 1. Stop if the [`ShutdownToken`] was cancelled
//! 2. Call `on_update` on all flows (scene mutation, instance buffer upload)
//! 3. Apply orbit input and upload the camera uniform
//! 4. Collect every flow's `on_render()` and draw it with the model pipeline
//! 5. Present frame

use std::{
    iter,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use instant::{Duration, Instant};

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::SceneConfig,
    context::{Context, InitContext},
    data_structures::model::DrawModel,
    render::{Instanced, Render},
};

/// Trait for implementing a renderable scene.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once after construction; configure the context (camera, clear colour, etc.)
/// 2. `on_window_events()` is called for each winit window event
/// 3. `on_update()` is called every frame before rendering
/// 4. `on_render()` is called each frame and specifies how to render `self`
pub trait GraphicsFlow {
    /// Initialize the flow and configure the context.
    ///
    /// This is the only place to modify the Context, e.g. the camera start
    /// position or the background colour.
    fn on_init(&mut self, ctx: &mut Context);

    /// Update state every frame. `dt` is the time since the previous frame.
    fn on_update(&mut self, ctx: &Context, dt: Duration);

    /// Handle window events (keyboard, mouse, window resizing, etc.).
    fn on_window_events(&mut self, ctx: &Context, event: &WindowEvent);

    /// Return renderable objects for this flow.
    fn on_render(&self) -> Render<'_>;
}

/// A flow constructor takes an [`InitContext`] and asynchronously returns a
/// boxed [`GraphicsFlow`]. Asset loading happens here.
pub type FlowConstructor =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = Box<dyn GraphicsFlow>>>>>;

/// Cooperative stop signal for the frame loop. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// GPU context plus surface status.
pub struct AppState {
    pub(crate) ctx: Context,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>, config: &SceneConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, config).await?;
        Ok(Self {
            ctx,
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.resize(width, height);
            self.is_surface_configured = true;
        }
    }

    fn render(&mut self, graphics_flows: &[Box<dyn GraphicsFlow>]) -> Result<(), wgpu::SurfaceError> {
        // invoke main render loop
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // With MSAA the pass draws into the multisampled target and resolves
        // into the surface texture
        let (target, resolve_target) = match &self.ctx.msaa_texture {
            Some(msaa) => (&msaa.view, Some(&view)),
            None => (&view, None),
        };

        let draws: Vec<Instanced> = graphics_flows
            .iter()
            .flat_map(|flow| flow.on_render().flatten())
            .collect();

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.ctx.pipeline);
            for instanced in draws {
                render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                render_pass.draw_model_instanced(
                    instanced.model,
                    0..instanced.amount as u32,
                    &self.ctx.camera.bind_group,
                    &self.ctx.light.bind_group,
                );
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub(crate) enum FlowEvent {
    #[allow(dead_code)]
    Initialized {
        state: AppState,
        flows: Vec<Box<dyn GraphicsFlow>>,
    },
    #[allow(dead_code)]
    Failed(String),
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[allow(dead_code)]
    proxy: EventLoopProxy<FlowEvent>,
    state: Option<AppState>,
    // This will hold the fully initialized flows once they are ready.
    graphics_flows: Vec<Box<dyn GraphicsFlow>>,
    // We use Option to `take()` it after use.
    constructors: Option<Vec<FlowConstructor>>,
    config: SceneConfig,
    shutdown: ShutdownToken,
    error: Option<anyhow::Error>,
    last_time: Instant,
}

impl App {
    fn new(
        event_loop: &EventLoop<FlowEvent>,
        constructors: Vec<FlowConstructor>,
        config: SceneConfig,
        shutdown: ShutdownToken,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            state: None,
            graphics_flows: Vec::new(),
            constructors: Some(constructors),
            config,
            shutdown,
            error: None,
            last_time: Instant::now(),
        })
    }

    fn initialize(&mut self, mut state: AppState, flows: Vec<Box<dyn GraphicsFlow>>) {
        let size = state.ctx.window.inner_size();
        state.resize(size.width, size.height);
        self.graphics_flows = flows;
        self.graphics_flows
            .iter_mut()
            .for_each(|flow| flow.on_init(&mut state.ctx));
        state.ctx.window.request_redraw();
        self.last_time = Instant::now();
        self.state = Some(state);
        log::info!("Scene is running");
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        self.shutdown.cancel();
        event_loop.exit();
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructors) = self.constructors.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("car-scene");

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;
            window_attributes = window_attributes.with_append(true);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(
                    event_loop,
                    anyhow::Error::from(e).context("Could not create the window"),
                );
                return;
            }
        };

        let config = self.config.clone();
        let init_future = async move {
            let app_state = AppState::new(window, &config).await?;
            let init = app_state.ctx.init_context(&config);
            let flow_futures: Vec<_> = constructors
                .into_iter()
                .map(|constructor| constructor(init.clone()))
                .collect();
            let flows: Vec<_> = futures::future::join_all(flow_futures).await;
            anyhow::Ok((app_state, flows))
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok((app_state, flows)) => self.initialize(app_state, flows),
                Err(e) => self.fail(event_loop, e.context("App initialization failed")),
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match init_future.await {
                    Ok((state, flows)) => FlowEvent::Initialized { state, flows },
                    Err(e) => FlowEvent::Failed(format!("App initialization failed: {e:#}")),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("The event loop closed before the scene was initialized");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            // This is the message from our wasm `spawn_local`
            FlowEvent::Initialized { state, flows } => self.initialize(state, flows),
            FlowEvent::Failed(message) => self.fail(event_loop, anyhow::anyhow!(message)),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.ctx.camera.controller.handle_window_events(&event);
        self.graphics_flows
            .iter_mut()
            .for_each(|flow| flow.on_window_events(&state.ctx, &event));

        match event {
            WindowEvent::CloseRequested => {
                self.shutdown.cancel();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                if self.shutdown.is_cancelled() {
                    log::info!("Shutting down");
                    event_loop.exit();
                    return;
                }
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                self.graphics_flows
                    .iter_mut()
                    .for_each(|flow| flow.on_update(&state.ctx, dt));
                state
                    .ctx
                    .camera
                    .update(&state.ctx.queue, &state.ctx.projection);

                match state.render(&self.graphics_flows) {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                        state.ctx.reconfigure();
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Initializes the platform logger: `env_logger` (filtered by `RUST_LOG`)
/// natively, the browser console on the web.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            log::warn!("Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            log::warn!("Could not initialize logger: {}", e);
        }
    }
}

/// Opens the window, constructs all flows and runs the event loop until the
/// window is closed or `shutdown` is cancelled.
pub fn run(
    constructors: Vec<FlowConstructor>,
    config: SceneConfig,
    shutdown: ShutdownToken,
) -> anyhow::Result<()> {
    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, constructors, config, shutdown)?;

    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelling_a_clone_stops_the_original() {
        let token = ShutdownToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());

        handle.cancel();
        assert!(token.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn token_can_be_cancelled_from_another_thread() {
        let token = ShutdownToken::new();
        let handle = token.clone();
        std::thread::spawn(move || handle.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
