//! 单例文件锁
//!
//! 桥接进程独占总线会话，同一台机器起两份只会互相抢请求节拍。
//! 文件锁比 pgrep 可靠：进程崩溃时锁随文件句柄自动释放。

use fs4::fs_std::FileExt;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::{self, Seek, SeekFrom, Write};

pub struct SingletonLock {
    file: File,
    _path: std::path::PathBuf,
}

impl SingletonLock {
    /// 尝试获取单例锁（非阻塞）
    ///
    /// 锁已被其他进程持有时返回 `AlreadyExists`。
    pub fn try_lock(lock_path: impl AsRef<std::path::Path>) -> Result<Self, io::Error> {
        let path = lock_path.as_ref();

        // 先不截断：锁还没拿到，文件里可能是活着的实例写的 PID
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .read(true)
            .open(path)?;

        if !file.try_lock_exclusive()? {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "bridge is already running (locked)",
            ));
        }

        // 拿到锁后清掉残留内容，写入当前 PID 便于排障
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        let pid = std::process::id();
        writeln!(&file, "{pid}")?;
        file.sync_all()?;

        Ok(Self {
            file,
            _path: path.to_path_buf(),
        })
    }
}

impl Drop for SingletonLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
