//! ### English
//! `FramePacket` (§3): the snapshot produced by one ECS tick and consumed by
//! the renderer — view matrix, camera parameters, static-mesh records, and a
//! mapping from GUI-context identity to that context's draw data for the
//! frame. Created before the tick, moved into the spawned render task,
//! dropped when that task completes; ordinary ownership gives that lifetime
//! for free, no explicit destroy step is needed the way the ring in
//! [`super::inflight`] needed one.
//!
//! ### 中文
//! `FramePacket`（§3）：由一次 ECS tick 产生、供渲染器消费的快照——视图矩阵、
//! 相机参数、静态网格记录列表，以及从 GUI 上下文身份到该上下文本帧绘制数据的
//! 映射。创建于 tick 之前，移入已 spawn 的渲染任务，该任务完成时随之丢弃；
//! 普通的所有权模型天然给出这段生命周期，不需要像 [`super::inflight`] 的
//! ring 那样显式析构。

use std::collections::HashMap;

/// ### English
/// Column-major 4x4 matrix, opaque to this crate beyond storage and copy —
/// the concrete math library is a collaborator concern, out of scope per
/// spec.md §1 Non-goals ("no concrete renderer/graphics-API backend").
///
/// ### 中文
/// 列主序 4x4 矩阵，对本 crate 而言除存储与拷贝外不透明——具体的数学库是
/// 协作方关心的问题，按 spec.md §1 Non-goals（“不含具体渲染器/图形 API 后端”）
/// 不在范围内。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [[f32; 4]; 4]);

impl Mat4 {
    /// ### English
    /// The 4x4 identity matrix.
    ///
    /// ### 中文
    /// 4x4 单位矩阵。
    pub const IDENTITY: Mat4 = Mat4([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);
}

/// ### English
/// Camera parameters for the frame. `aspect` is left for the renderer to
/// fill in from the current swapchain extent (§3: "aspect filled by
/// renderer") rather than being supplied by the ECS tick.
///
/// ### 中文
/// 本帧的相机参数。`aspect` 留给渲染器根据当前 swapchain 尺寸填入
/// （§3：“aspect 由渲染器填充”），而非由 ECS tick 提供。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    /// ### English
    /// `None` until the renderer fills it in for the window being presented.
    ///
    /// ### 中文
    /// 在渲染器为正在呈现的窗口填入之前为 `None`。
    pub aspect: Option<f32>,
}

/// ### English
/// A handle to a loaded renderable asset; opaque to this crate (§1
/// Non-goals: no concrete asset format).
///
/// ### 中文
/// 已加载可渲染资源的句柄；对本 crate 不透明（§1 Non-goals：无具体资源格式）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetHandle(pub u64);

/// ### English
/// One static mesh instance recorded by the ECS tick: its world transform
/// plus the asset it references.
///
/// ### 中文
/// 由 ECS tick 记录的一个静态网格实例：其世界变换，加上其引用的资源。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticMeshRecord {
    pub transform: Mat4,
    pub asset: AssetHandle,
}

/// ### English
/// Identifies a GUI context whose draw data is attached to this frame.
///
/// ### 中文
/// 标识一个其绘制数据被附加到本帧的 GUI 上下文。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuiContextId(pub u64);

/// ### English
/// Opaque per-context GUI draw data for the frame; the concrete immediate-
/// mode GUI library is a collaborator concern, out of scope here.
///
/// ### 中文
/// 本帧中某个上下文的不透明 GUI 绘制数据；具体的 immediate-mode GUI 库是
/// 协作方关心的问题，本处不在范围内。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuiDrawData(pub Vec<u8>);

/// ### English
/// The full per-frame snapshot (§3). Produced by [`crate::ecs::EcsWorld::
/// progress`], consumed by [`super::pipeline::RendererOps::render`].
///
/// ### 中文
/// 完整的逐帧快照（§3）。由 [`crate::ecs::EcsWorld::progress`] 产生，由
/// [`super::pipeline::RendererOps::render`] 消费。
#[derive(Debug, Clone, PartialEq)]
pub struct FramePacket {
    pub view_matrix: Mat4,
    pub camera: CameraParams,
    pub static_meshes: Vec<StaticMeshRecord>,
    pub gui_draw_data: HashMap<GuiContextId, GuiDrawData>,
}

impl FramePacket {
    /// ### English
    /// An empty packet with an identity view matrix and no camera aspect
    /// filled in yet — the shape [`super::pipeline::FramePipeline`] creates
    /// fresh at the start of each `TickECS` step, before handing a mutable
    /// reference to [`crate::ecs::EcsWorld::progress`].
    ///
    /// ### 中文
    /// 一个视图矩阵为单位矩阵、相机 aspect 尚未填入的空 packet——
    /// [`super::pipeline::FramePipeline`] 在每次 `TickECS` 步骤开始时新建的形态，
    /// 之后会把其可变引用交给 [`crate::ecs::EcsWorld::progress`]。
    pub fn empty() -> Self {
        Self {
            view_matrix: Mat4::IDENTITY,
            camera: CameraParams {
                fov_y_radians: std::f32::consts::FRAC_PI_4,
                near: 0.1,
                far: 1000.0,
                aspect: None,
            },
            static_meshes: Vec::new(),
            gui_draw_data: HashMap::new(),
        }
    }
}

impl Default for FramePacket {
    fn default() -> Self {
        Self::empty()
    }
}
