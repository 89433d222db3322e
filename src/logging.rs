//! 日志系统配置
//!
//! 控制台 + 文件双输出，文件按大小滚动，启动时清理过期日志

use crate::config::LogConfig;
use chrono::{Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "share-link-proxy.";
/// 日志文件名后缀
const LOG_FILE_SUFFIX: &str = ".log";
/// 日志时间格式
const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 滚动写入状态
struct RollingState {
    /// 进程启动时间戳，同一次运行的所有文件共用
    started_at: String,
    dir: PathBuf,
    file: Option<File>,
    /// 0 为首个文件，之后依次 _1、_2 ...
    index: u32,
    max_size: u64,
    written: u64,
}

impl RollingState {
    fn open(dir: PathBuf, max_size: u64) -> io::Result<Self> {
        let mut state = Self {
            started_at: Local::now().format("%Y-%m-%d-%H%M%S").to_string(),
            dir,
            file: None,
            index: 0,
            max_size,
            written: 0,
        };
        state.open_current()?;
        Ok(state)
    }

    fn current_path(&self) -> PathBuf {
        let name = match self.index {
            0 => format!("{}{}{}", LOG_FILE_PREFIX, self.started_at, LOG_FILE_SUFFIX),
            n => format!("{}{}_{}{}", LOG_FILE_PREFIX, self.started_at, n, LOG_FILE_SUFFIX),
        };
        self.dir.join(name)
    }

    fn open_current(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())?;
        self.file = Some(file);
        self.written = 0;
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize> {
        // 单条日志不拆分，写入前判断是否需要切换文件
        if self.written > 0 && self.written + buf.len() as u64 > self.max_size {
            if let Some(mut old) = self.file.take() {
                old.flush()?;
            }
            self.index += 1;
            self.open_current()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "日志文件未打开"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }
}

/// 按大小滚动的日志写入器（线程安全，可 Clone）
#[derive(Clone)]
pub struct RollingFileWriter {
    state: Arc<Mutex<RollingState>>,
}

impl RollingFileWriter {
    pub fn new(dir: PathBuf, max_size: u64) -> io::Result<Self> {
        Ok(Self {
            state: Arc::new(Mutex::new(RollingState::open(dir, max_size)?)),
        })
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, RollingState>> {
        self.state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "日志写入锁已中毒"))
    }
}

impl Write for RollingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write_bytes(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock()?.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// 日志系统守卫
/// 必须保持存活，否则文件写入线程会退出
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

fn console_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
        .with_ansi(true)
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先于配置中的级别。文件输出初始化失败时回退到仅控制台。
pub fn init_logging(config: &LogConfig) -> LogGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if !config.enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer())
            .init();
        info!("日志系统初始化完成（仅控制台输出）");
        return LogGuard { _file_guard: None };
    }

    let writer = fs::create_dir_all(&config.log_dir)
        .and_then(|_| RollingFileWriter::new(config.log_dir.clone(), config.max_file_size));

    let writer = match writer {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!(
                "初始化日志文件失败: {:?}, 错误: {}，回退到仅控制台输出",
                config.log_dir, e
            );
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer())
                .init();
            return LogGuard { _file_guard: None };
        }
    };

    let (non_blocking, file_guard) = tracing_appender::non_blocking(writer);

    // 文件输出层（不带 ANSI 颜色）
    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer())
        .with(file_layer)
        .init();

    info!(
        "日志系统初始化完成: 目录={:?}, 保留天数={}, 级别={}, 单文件最大={:.1}MB",
        config.log_dir,
        config.retention_days,
        config.level,
        config.max_file_size as f64 / 1024.0 / 1024.0
    );

    let removed = cleanup_old_logs(&config.log_dir, config.retention_days, Local::now().date_naive());
    if removed > 0 {
        info!("已清理 {} 个过期日志文件", removed);
    }

    LogGuard {
        _file_guard: Some(file_guard),
    }
}

/// 清理过期日志文件，返回删除数量
fn cleanup_old_logs(log_dir: &Path, retention_days: u32, today: NaiveDate) -> usize {
    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("读取日志目录失败: {:?}, 错误: {}", log_dir, e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(date) = date_from_log_name(name) else {
            continue;
        };

        if (today - date).num_days() > retention_days as i64 {
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!("已删除过期日志文件: {:?}", path);
                }
                Err(e) => tracing::warn!("删除过期日志文件失败: {:?}, 错误: {}", path, e),
            }
        }
    }
    removed
}

/// 从日志文件名中取出日期
///
/// `share-link-proxy.2024-05-01-120000_2.log` -> 2024-05-01
fn date_from_log_name(name: &str) -> Option<NaiveDate> {
    let stem = name
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_suffix(LOG_FILE_SUFFIX)?;
    let date = stem.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
