//! ### English
//! The frame pipeline (§4.8): one long-lived task per process, running on
//! the OS-polling slot, that repeatedly cycles `PollOS -> TickECS ->
//! SpawnRender -> RetireFrameScope` until the ECS requests shutdown, then
//! drains outstanding render work and returns. The renderer, windowing
//! system, ECS, and file system are collaborators injected as trait objects
//! (§6) — this module owns only the orchestration.
//!
//! ### 中文
//! frame pipeline（§4.8）：每进程一个长生命周期任务，运行在 OS-polling slot
//! 上，循环执行 `PollOS -> TickECS -> SpawnRender -> RetireFrameScope`，
//! 直到 ECS 请求关闭，随后排空未完成的渲染工作并返回。渲染器、窗口系统、ECS
//! 与文件系统都是作为 trait object 注入的协作方（§6）——本模块只负责编排。

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::ecs::EcsWorld;
use crate::error::{fatal, CoreError, TransientKind};
use crate::frame::inflight::InflightResource;
use crate::frame::mutex::AsyncMutex;
use crate::frame::packet::FramePacket;
use crate::scheduler::blocking_pool::BlockingPool;
use crate::scheduler::os_polling::OsPollingSlot;
use crate::scheduler::event_queue::EventQueue;
use crate::scheduler::worker_pool::WorkerPool;
use crate::static_scope::StaticScope;
use crate::task::async_scope::AsyncScope;
use crate::task::driver::block_on;
use crate::task::sender::{box_sender, BoxSender, Outcome, Scheduler, Sender};

/// ### English
/// Opaque handle to an OS window, minted by [`WindowingOps::create_window`].
///
/// ### 中文
/// 由 [`WindowingOps::create_window`] 分发的不透明 OS 窗口句柄。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

/// ### English
/// Minimal window creation parameters; the concrete windowing backend (GLFW,
/// winit, ...) is a collaborator concern out of scope here.
///
/// ### 中文
/// 最小化的窗口创建参数；具体窗口后端（GLFW、winit……）是协作方关心的问题，
/// 本处不在范围内。
#[derive(Debug, Clone)]
pub struct WindowCreateInfo {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

/// ### English
/// Windowing collaborator (§6), object-safe. The core guarantees every
/// method here is invoked only from the OS-polling thread — implementations
/// may `debug_assert_eq!` the calling thread against whichever id they
/// captured during `create_window`, mirroring [`OsPollingSlot`]'s own
/// `pump`-time assertion.
///
/// ### 中文
/// 窗口系统协作方（§6），对象安全。核心库保证本处每个方法都只会在
/// OS-polling 线程上被调用——实现可以用 `debug_assert_eq!` 将调用线程与
/// `create_window` 时捕获的线程 id 比对，这与 [`OsPollingSlot`] 自身在
/// `pump` 时的断言做法一致。
pub trait WindowingOps: Send + Sync {
    fn create_window(&self, info: WindowCreateInfo) -> WindowHandle;
    fn poll_events(&self);
    fn framebuffer_size(&self, window: WindowHandle) -> (u32, u32);
    fn windows(&self) -> Vec<WindowHandle>;
}

/// ### English
/// A successfully acquired swapchain image for one window.
///
/// ### 中文
/// 某个窗口成功获取到的一张 swapchain 图像。
#[derive(Debug, Clone, Copy)]
pub struct SwapchainImage {
    pub window: WindowHandle,
    pub image_index: u32,
}

/// ### English
/// What `render` hands back: enough to wait for the GPU work it submitted
/// and to present it.
///
/// ### 中文
/// `render` 返回的内容：足以等待其提交的 GPU 工作完成、并将其呈现。
#[derive(Debug, Clone, Copy)]
pub struct RenderSubmission {
    pub window: WindowHandle,
    pub image_index: u32,
    pub fence_id: u64,
}

/// ### English
/// Outcome of presenting a [`RenderSubmission`].
///
/// ### 中文
/// 呈现一个 [`RenderSubmission`] 的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentResult {
    Ok,
    Suboptimal,
    OutOfDate,
}

/// ### English
/// GPU-submission collaborator (§6), object-safe, expressed via
/// [`BoxSender`]-returning methods rather than `impl Sender` (see
/// [`crate::task::sender::BoxSender`]'s docs for why). A concrete Vulkan
/// implementation is out of scope (spec.md §1 Non-goals); this crate ships
/// only [`NullRenderer`] as a test double.
///
/// ### 中文
/// GPU 提交协作方（§6），对象安全，通过返回 [`BoxSender`] 的方法表达而非
/// `impl Sender`（原因见 [`crate::task::sender::BoxSender`] 的文档）。具体的
/// Vulkan 实现不在范围内（spec.md §1 Non-goals）；本 crate 仅提供测试替身
/// [`NullRenderer`]。
pub trait RendererOps: Send + Sync {
    /// ### English
    /// Acquires the next swapchain image for `window`. `Ok(None)` means the
    /// swapchain is `OutOfDate`/`Suboptimal` and this window's frame is
    /// skipped (§4.8 step 3/failure semantics).
    ///
    /// ### 中文
    /// 为 `window` 获取下一张 swapchain 图像。`Ok(None)` 表示 swapchain 处于
    /// `OutOfDate`/`Suboptimal`，该窗口本帧被跳过（§4.8 第 3 步/失败语义）。
    fn acquire_next_image(&self, window: WindowHandle) -> BoxSender<Option<SwapchainImage>, CoreError>;

    /// ### English
    /// Records and submits this window's render work for `frame_index`
    /// against `packet` (§4.8 steps 4-5 collapsed: upload + record + submit).
    ///
    /// ### 中文
    /// 针对 `frame_index` 与 `packet`，记录并提交该窗口的渲染工作
    /// （§4.8 第 4-5 步的合并：上传 + 记录 + 提交）。
    fn render(
        &self,
        frame_index: u64,
        image: SwapchainImage,
        packet: Arc<FramePacket>,
    ) -> BoxSender<RenderSubmission, CoreError>;

    /// ### English
    /// Presents `submission`'s image.
    ///
    /// ### 中文
    /// 呈现 `submission` 对应的图像。
    fn present(&self, submission: RenderSubmission) -> BoxSender<PresentResult, CoreError>;

    /// ### English
    /// Blocks (on the calling — blocking-pool — thread) until `submission`'s
    /// fence signals, or returns `CoreError::DeviceFatal` on timeout (§5
    /// "fence waits use a fixed long timeout (~1s); exceeding implies device
    /// loss").
    ///
    /// ### 中文
    /// 在调用线程（blocking-pool 线程）上阻塞，直至 `submission` 的 fence
    /// 触发信号；超时则返回 `CoreError::DeviceFatal`（§5：“fence 等待使用固定
    /// 的较长超时（约 1s）；超时意味着设备丢失”）。
    fn wait_for_fence(&self, submission: RenderSubmission) -> BoxSender<(), CoreError>;

    /// ### English
    /// Recreates `window`'s swapchain, asynchronously, after an `OutOfDate`/
    /// failed presentation.
    ///
    /// ### 中文
    /// 在一次 `OutOfDate`/呈现失败之后，异步重建 `window` 的 swapchain。
    fn recreate_swapchain(&self, window: WindowHandle) -> BoxSender<(), CoreError>;

    /// ### English
    /// Updates the renderer's notion of which windows to present into, and
    /// their extents (§6: `update_presentation_target(views, extent)`).
    ///
    /// ### 中文
    /// 更新渲染器对“呈现到哪些窗口”及其尺寸的认知（§6：
    /// `update_presentation_target(views, extent)`）。
    fn update_presentation_target(&self, windows: Vec<WindowHandle>) -> BoxSender<(), CoreError>;
}

/// ### English
/// An opened, readable file handle (§6). Returned by [`AsyncFileSystem::
/// open_read_only`].
///
/// ### 中文
/// 一个已打开、可读的文件句柄（§6）。由 [`AsyncFileSystem::open_read_only`]
/// 返回。
pub trait AsyncFile: Send + Sync {
    fn read(&self) -> BoxSender<Vec<u8>, CoreError>;
}

/// ### English
/// File-system collaborator (§6). The reference implementation ([`mod@super::
/// blocking_file`]) is backed by the blocking pool (§4.4), since no uring/
/// iocp adapter is in scope — the core only requires the `task<bytes>`
/// contract `read()` exposes.
///
/// ### 中文
/// 文件系统协作方（§6）。参考实现（[`mod@super::blocking_file`]）基于
/// blocking pool（§4.4）实现，因为 uring/iocp 适配器不在范围内——核心库只
/// 需要 `read()` 暴露的 `task<bytes>` 契约。
pub trait AsyncFileSystem: Send + Sync {
    fn open_read_only(&self, path: &Path) -> BoxSender<Arc<dyn AsyncFile>, CoreError>;
}

/// ### English
/// The orchestrator itself. Owns the three scheduler flavors, the rendering
/// back-pressure scope, `frame_mutex`, the `inflight_mutex` ring, and the
/// injected collaborators. Constructed once per process (§4.8 invariant).
///
/// ### 中文
/// 编排器本身。持有三种调度器、渲染背压 scope、`frame_mutex`、
/// `inflight_mutex` ring，以及注入的各协作方。每进程构造一次（§4.8 不变式）。
pub struct FramePipeline {
    config: EngineConfig,
    ecs: Box<dyn EcsWorld>,
    renderer: Arc<dyn RendererOps>,
    windowing: Arc<dyn WindowingOps>,
    os_polling: Arc<OsPollingSlot>,
    worker_pool: Arc<WorkerPool>,
    blocking_pool: Arc<BlockingPool>,
    next_frame_events: Arc<EventQueue>,
    rendering_scope: Arc<StaticScope>,
    frame_mutex: Arc<AsyncMutex>,
    inflight_mutexes: Arc<InflightResource<AsyncMutex>>,
    frame_scope: Arc<AsyncScope>,
    current_frame_idx: u64,
    last_tick: Instant,
}

impl FramePipeline {
    /// ### English
    /// Builds a pipeline from `config` and its collaborators. Spawns the
    /// worker and blocking thread pools immediately; the OS-polling slot is
    /// bound to a thread only once [`FramePipeline::run_event_loop`] is
    /// called on it.
    ///
    /// ### 中文
    /// 依据 `config` 及其协作方构建一个 pipeline。立即生成 worker 与 blocking
    /// 线程池；OS-polling slot 只有在其上调用 [`FramePipeline::
    /// run_event_loop`] 时才会绑定到线程。
    pub fn new(
        config: EngineConfig,
        ecs: Box<dyn EcsWorld>,
        renderer: Arc<dyn RendererOps>,
        windowing: Arc<dyn WindowingOps>,
    ) -> Self {
        let worker_pool = Arc::new(WorkerPool::new(config.resolved_worker_threads(), "frame-worker"));
        let blocking_pool = Arc::new(BlockingPool::new(
            config.resolved_blocking_threads(),
            "frame-blocking",
        ));
        let inflight_frames = config.inflight_frames;

        Self {
            rendering_scope: StaticScope::new(inflight_frames),
            inflight_mutexes: Arc::new(InflightResource::new_with(inflight_frames, |_| {
                AsyncMutex::new()
            })),
            config,
            ecs,
            renderer,
            windowing,
            os_polling: Arc::new(OsPollingSlot::new()),
            worker_pool,
            blocking_pool,
            next_frame_events: Arc::new(EventQueue::new()),
            frame_mutex: Arc::new(AsyncMutex::new()),
            frame_scope: AsyncScope::new(),
            current_frame_idx: 0,
            last_tick: Instant::now(),
        }
    }

    /// ### English
    /// Binds the OS-polling slot to the calling thread and drives the frame
    /// pipeline to completion on it (§4.8). Returns `0` on clean shutdown.
    /// Every fallible condition this reference implementation models
    /// terminates the process directly ([`fatal`]/[`crate::error::
    /// invariant_violation`]) rather than unwinding back here, so `-1`
    /// (§6: "the main task errored") is not produced by this implementation
    /// — the signature still returns `i32` to match the contract.
    ///
    /// ### 中文
    /// 将 OS-polling slot 绑定到调用线程，并在其上将 frame pipeline 驱动至
    /// 完成（§4.8）。正常关闭时返回 `0`。本参考实现所建模的每一种可能失败
    /// 情况都直接终止进程（[`fatal`]/[`crate::error::invariant_violation`]），
    /// 而不会展开回到此处，因此 `-1`（§6：“主任务出错”）在本实现中不会产生——
    /// 签名仍返回 `i32` 以匹配契约。
    pub fn run_event_loop(mut self) -> i32 {
        self.os_polling.bind_current_thread();
        block_on(self.run_loop());
        0
    }

    async fn run_loop(&mut self) {
        loop {
            // 1. PollOS
            self.os_polling.schedule().run().await;
            self.current_frame_idx += 1;
            let frame_index = self.current_frame_idx;
            self.windowing.poll_events();
            self.next_frame_events.execute_all();

            let now = Instant::now();
            let delta_seconds = (now - self.last_tick).as_secs_f32();
            self.last_tick = now;

            // 2. TickECS
            let mut packet = FramePacket::empty();
            let keep_running = self.ecs.progress(delta_seconds, &mut packet);
            let packet = Arc::new(packet);

            // 3. SpawnRender — suspends iff rendering_scope is at capacity.
            let render_task = RenderFrameTask {
                frame_index,
                packet,
                renderer: self.renderer.clone(),
                windowing: self.windowing.clone(),
                worker_pool: self.worker_pool.clone(),
                blocking_pool: self.blocking_pool.clone(),
                frame_mutex: self.frame_mutex.clone(),
                inflight_mutexes: self.inflight_mutexes.clone(),
            };
            self.rendering_scope.spawn_next(render_task).run().await;

            // 4. RetireFrameScope — leave the OS thread, finish on a worker.
            let finished_scope = std::mem::replace(&mut self.frame_scope, AsyncScope::new());
            self.worker_pool.schedule().run().await;
            finished_scope.cleanup().run().await;

            if !keep_running {
                // 5. Shutdown: drain all inflight render work, then stop.
                self.rendering_scope.all_finished().run().await;
                self.worker_pool.request_stop();
                self.blocking_pool.request_stop();
                return;
            }
        }
    }
}

struct RenderFrameTask {
    frame_index: u64,
    packet: Arc<FramePacket>,
    renderer: Arc<dyn RendererOps>,
    windowing: Arc<dyn WindowingOps>,
    worker_pool: Arc<WorkerPool>,
    blocking_pool: Arc<BlockingPool>,
    frame_mutex: Arc<AsyncMutex>,
    inflight_mutexes: Arc<InflightResource<AsyncMutex>>,
}

impl Sender for RenderFrameTask {
    type Value = ();
    type Error = std::convert::Infallible;

    async fn run(self) -> Outcome<(), std::convert::Infallible> {
        // 1. Acquire the global frame_mutex (FIFO-serialized submission).
        self.frame_mutex.async_lock().run().await;

        // 2. Acquire this frame-slot's inflight_mutex.
        let slot_mutex = self.inflight_mutexes.get(self.frame_index);
        slot_mutex.async_lock().run().await;

        // 3-5. Per window: acquire image, render, present. OutOfDate windows
        // are only recorded here — recreating the swapchain is slow and must
        // not hold frame_mutex (step 8, after the mutex is released below).
        let mut submissions = Vec::new();
        let mut needs_recreate = Vec::new();
        for window in self.windowing.windows() {
            let image = match self.renderer.acquire_next_image(window).run().await {
                Outcome::Value(Some(image)) => image,
                Outcome::Value(None) => continue, // OutOfDate/Suboptimal: skip this window this frame.
                Outcome::Error(err) => fatal(err),
                Outcome::Done => continue,
            };

            let submission = match self
                .renderer
                .render(self.frame_index, image, self.packet.clone())
                .run()
                .await
            {
                Outcome::Value(submission) => submission,
                Outcome::Error(err) => fatal(err),
                Outcome::Done => continue,
            };

            match self.renderer.present(submission).run().await {
                Outcome::Value(PresentResult::Ok) => {}
                Outcome::Value(PresentResult::Suboptimal) => {}
                Outcome::Value(PresentResult::OutOfDate) => {
                    needs_recreate.push(window);
                }
                Outcome::Error(err) => fatal(err),
                Outcome::Done => continue,
            }

            submissions.push(submission);
        }

        // 6. Release frame_mutex: ordering is now fixed by GPU submission.
        self.frame_mutex.unlock();

        // 7. Transition to the blocking pool and wait for all fences.
        self.blocking_pool.schedule().run().await;
        for submission in &submissions {
            match self.renderer.wait_for_fence(*submission).run().await {
                Outcome::Value(()) => {}
                Outcome::Error(err) => fatal(err),
                Outcome::Done => {}
            }
        }

        // Return to the main (worker) scheduler before touching shared state.
        self.worker_pool.schedule().run().await;

        // 8. Recreate swapchains flagged OutOfDate, now that frame_mutex is
        // free and every fence for this frame has been waited on.
        for window in needs_recreate {
            if let Outcome::Error(err) = self.renderer.recreate_swapchain(window).run().await {
                fatal(err);
            }
        }

        // 9. Release inflight_mutex.
        slot_mutex.unlock();

        Outcome::Value(())
    }
}

/// ### English
/// A no-op [`RendererOps`] test double: every window acquires successfully,
/// every render/present/fence-wait succeeds trivially, used by the frame-
/// pipeline tests since a concrete Vulkan backend is out of scope (§1
/// Non-goals).
///
/// ### 中文
/// 一个空操作的 [`RendererOps`] 测试替身：每个窗口都成功获取图像，每次
/// render/present/fence 等待都平凡地成功，供 frame-pipeline 测试使用，因为
/// 具体的 Vulkan 后端不在范围内（§1 Non-goals）。
pub struct NullRenderer;

impl RendererOps for NullRenderer {
    fn acquire_next_image(&self, window: WindowHandle) -> BoxSender<Option<SwapchainImage>, CoreError> {
        box_sender(async move {
            Outcome::Value(Some(SwapchainImage {
                window,
                image_index: 0,
            }))
        })
    }

    fn render(
        &self,
        _frame_index: u64,
        image: SwapchainImage,
        _packet: Arc<FramePacket>,
    ) -> BoxSender<RenderSubmission, CoreError> {
        box_sender(async move {
            Outcome::Value(RenderSubmission {
                window: image.window,
                image_index: image.image_index,
                fence_id: 0,
            })
        })
    }

    fn present(&self, _submission: RenderSubmission) -> BoxSender<PresentResult, CoreError> {
        box_sender(async move { Outcome::Value(PresentResult::Ok) })
    }

    fn wait_for_fence(&self, _submission: RenderSubmission) -> BoxSender<(), CoreError> {
        box_sender(async move { Outcome::Value(()) })
    }

    fn recreate_swapchain(&self, _window: WindowHandle) -> BoxSender<(), CoreError> {
        box_sender(async move { Outcome::Value(()) })
    }

    fn update_presentation_target(&self, _windows: Vec<WindowHandle>) -> BoxSender<(), CoreError> {
        box_sender(async move { Outcome::Value(()) })
    }
}

/// ### English
/// A fixed-window-set [`WindowingOps`] test double with no real OS backing,
/// used the same way [`NullRenderer`] is.
///
/// ### 中文
/// 一个拥有固定窗口集合、不依赖真实 OS 的 [`WindowingOps`] 测试替身，用途与
/// [`NullRenderer`] 相同。
pub struct NullWindowing {
    handles: Vec<WindowHandle>,
}

impl NullWindowing {
    pub fn new(window_count: u64) -> Self {
        Self {
            handles: (0..window_count).map(WindowHandle).collect(),
        }
    }
}

impl WindowingOps for NullWindowing {
    fn create_window(&self, _info: WindowCreateInfo) -> WindowHandle {
        self.handles.first().copied().unwrap_or(WindowHandle(0))
    }

    fn poll_events(&self) {}

    fn framebuffer_size(&self, _window: WindowHandle) -> (u32, u32) {
        (1920, 1080)
    }

    fn windows(&self) -> Vec<WindowHandle> {
        self.handles.clone()
    }
}

/// ### English
/// Converts a swapchain-acquire failure into the transient/fatal split §4.8
/// describes: `OutOfDate` is recoverable (skip this window, mark for
/// recreation), anything else is treated as device-fatal.
///
/// ### 中文
/// 按 §4.8 的描述，将一次 swapchain acquire 失败划分为瞬态/致命两类：
/// `OutOfDate` 可恢复（跳过该窗口，标记待重建），其余一律视为设备致命错误。
pub fn classify_acquire_failure(kind: TransientKind) -> CoreError {
    CoreError::Transient(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EcsWorld;

    struct FixedTickWorld {
        remaining: u32,
    }

    impl EcsWorld for FixedTickWorld {
        fn progress(&mut self, _delta_seconds: f32, packet: &mut FramePacket) -> bool {
            packet.static_meshes.clear();
            if self.remaining == 0 {
                return false;
            }
            self.remaining -= 1;
            true
        }
    }

    #[test]
    fn run_event_loop_drains_and_returns_zero_on_shutdown() {
        let config = EngineConfig::new()
            .with_inflight_frames(2)
            .with_worker_threads(2)
            .with_blocking_threads(1);
        let pipeline = FramePipeline::new(
            config,
            Box::new(FixedTickWorld { remaining: 3 }),
            Arc::new(NullRenderer),
            Arc::new(NullWindowing::new(2)),
        );
        assert_eq!(pipeline.run_event_loop(), 0);
    }
}
