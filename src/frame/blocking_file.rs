//! ### English
//! The reference [`AsyncFileSystem`]/[`AsyncFile`] implementation (§6,
//! added): synchronous `std::fs` calls transitioned onto the blocking pool
//! (§4.4) rather than a uring/iocp adapter, since the core only requires the
//! `task<bytes>` contract `read()` exposes and a concrete async-I/O backend
//! is out of scope.
//!
//! ### 中文
//! 参考的 [`AsyncFileSystem`]/[`AsyncFile`] 实现（§6，新增）：通过
//! blocking pool（§4.4）转移线程后调用同步的 `std::fs`，而非 uring/iocp
//! 适配器，因为核心库只需要 `read()` 暴露的 `task<bytes>` 契约，具体的异步
//! I/O 后端不在范围内。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CoreError;
use crate::scheduler::blocking_pool::BlockingPool;
use crate::task::sender::{box_sender, BoxSender, Outcome, Scheduler, Sender};

use super::pipeline::{AsyncFile, AsyncFileSystem};

/// ### English
/// Opens files under the blocking pool's threads.
///
/// ### 中文
/// 在 blocking pool 的线程上打开文件。
pub struct BlockingFileSystem {
    pool: Arc<BlockingPool>,
}

impl BlockingFileSystem {
    pub fn new(pool: Arc<BlockingPool>) -> Self {
        Self { pool }
    }
}

impl AsyncFileSystem for BlockingFileSystem {
    fn open_read_only(&self, path: &Path) -> BoxSender<Arc<dyn AsyncFile>, CoreError> {
        let pool = self.pool.clone();
        let path: PathBuf = path.to_path_buf();
        box_sender(async move {
            match pool.schedule().run().await {
                Outcome::Value(()) => {}
                Outcome::Done => return Outcome::Done,
                Outcome::Error(never) => match never {},
            }
            if !path.is_file() {
                return Outcome::Error(CoreError::NotFound(path.display().to_string()));
            }
            let handle: Arc<dyn AsyncFile> = Arc::new(BlockingFile { pool, path });
            Outcome::Value(handle)
        })
    }
}

struct BlockingFile {
    pool: Arc<BlockingPool>,
    path: PathBuf,
}

impl AsyncFile for BlockingFile {
    fn read(&self) -> BoxSender<Vec<u8>, CoreError> {
        let pool = self.pool.clone();
        let path = self.path.clone();
        box_sender(async move {
            match pool.schedule().run().await {
                Outcome::Value(()) => {}
                Outcome::Done => return Outcome::Done,
                Outcome::Error(never) => match never {},
            }
            match std::fs::read(&path) {
                Ok(bytes) => Outcome::Value(bytes),
                Err(err) => Outcome::Error(CoreError::NotFound(format!(
                    "{}: {err}",
                    path.display()
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::driver::block_on;
    use std::io::Write;

    #[test]
    fn reads_back_file_contents() {
        let dir = std::env::temp_dir().join(format!("frame-core-test-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hello.txt");
        std::fs::File::create(&path).unwrap().write_all(b"hi").unwrap();

        let pool = Arc::new(BlockingPool::new(1, "test-file-blocking"));
        let fs = BlockingFileSystem::new(pool);

        let file = match block_on(fs.open_read_only(&path).run()) {
            Outcome::Value(f) => f,
            _ => panic!("expected open_read_only to succeed"),
        };
        let bytes = match block_on(file.read().run()) {
            Outcome::Value(b) => b,
            _ => panic!("expected read to succeed"),
        };
        assert_eq!(bytes, b"hi");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_reports_not_found() {
        let pool = Arc::new(BlockingPool::new(1, "test-file-blocking-missing"));
        let fs = BlockingFileSystem::new(pool);
        let outcome = block_on(fs.open_read_only(Path::new("/does/not/exist")).run());
        assert!(matches!(outcome, Outcome::Error(CoreError::NotFound(_))));
    }
}
