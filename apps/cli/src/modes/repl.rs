//! REPL 模式（洗碗机控制台）
//!
//! 专用输入线程持有 rustyline 编辑器（历史记录随会话存活），主线程
//! 跑事件循环。提示符有节制：只有在所有挂起请求都结清之后才向输入
//! 线程发一枚令牌，输入线程拿到令牌才显示 `dishwasher> `——家电响应
//! 慢，请求在途时出提示符只会让输出互相踩踏。

use anyhow::Result;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use washlink_sdk::bus::{SimulatedDishwasher, SimulatorProfile};
use washlink_sdk::client::SessionClient;
use washlink_sdk::driver::{SessionBuilder, SessionConfig, TelemetryEvent};
use washlink_sdk::protocol::{FieldId, FieldRecord, Personality, PersonalitySource};
use washlink_sdk::tools::{describe_integer, describe_raw, describe_record, wall_clock_text};

/// 挂起截止时间的巡检间隔
const TICK: Duration = Duration::from_millis(250);

/// 带时间戳的控制台输出
fn log(s: &str) {
    println!("{}| {}", wall_clock_text(SystemTime::now()), s);
}

/// 一次在途的读请求
struct PendingRead {
    field: FieldId,
    /// `raw <field>`：响应按原始值展示
    raw: bool,
    deadline: Instant,
}

struct Console {
    client: SessionClient,
    pending: Vec<PendingRead>,
    /// 接入未完成前算一个挂起项，压住提示符
    ready: bool,
    request_timeout: Duration,
    prompt_tx: Sender<()>,
}

impl Console {
    fn pending_count(&self) -> usize {
        self.pending.len() + usize::from(!self.ready)
    }

    /// 挂起清零时放行提示符；令牌通道容量 1，重复放行自然去重
    fn maybe_prompt(&self) {
        if self.pending_count() == 0 {
            let _ = self.prompt_tx.try_send(());
        }
    }

    /// 提交一次读并登记截止时间
    fn enqueue_read(&mut self, field: FieldId, raw: bool) {
        if let Err(err) = self.client.session().read(field) {
            log(&err.to_string());
            return;
        }
        self.pending.push(PendingRead {
            field,
            raw,
            deadline: Instant::now() + self.request_timeout,
        });
    }

    /// 扫描过期的挂起读
    fn sweep_deadlines(&mut self) {
        let now = Instant::now();
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].deadline <= now {
                let entry = self.pending.remove(index);
                log(&format!("timed out waiting for response for {}", entry.field));
            } else {
                index += 1;
            }
        }
    }

    fn handle_event(&mut self, event: TelemetryEvent) -> bool {
        match event {
            TelemetryEvent::ApplianceAnnounced { info } => {
                log(&format!(
                    "dishwasher connection detected - version={}; address={:x}",
                    info.version_text(),
                    info.address
                ));
            },

            TelemetryEvent::ApplianceSelected { info } => {
                log(&format!("selected dishwasher at address {:x}", info.address));
            },

            // 占位设备：探测已拒绝，无需打扰用户
            TelemetryEvent::ApplianceRejected { .. } => {},

            TelemetryEvent::FieldRead { field, record, raw } => {
                match self.pending.iter().position(|p| p.field == field) {
                    Some(index) => {
                        let entry = self.pending.remove(index);
                        if entry.raw {
                            log(&format!("{field}: {}", describe_raw(&raw)));
                        } else {
                            log(&format!("{field}: {}", describe_record(&record)));
                        }
                    },
                    // 接入期读响应与 sensors 读都走这里
                    None => {
                        if self.pending_count() == 0 {
                            log("");
                        }
                        log(&format!("{field}: {}", describe_record(&record)));
                    },
                }
            },

            TelemetryEvent::FieldChanged { field, record, .. } => {
                if self.pending_count() == 0 {
                    log("");
                }
                log(&format!("{field}: {}", describe_record(&record)));
            },

            TelemetryEvent::DecodeFailed { field, error } => {
                if let Some(index) = self.pending.iter().position(|p| p.field == field) {
                    self.pending.remove(index);
                }
                log(&format!("{field}: <{error}>"));
            },

            // 接入期超时由会话自行结清，控制台只关心自己登记的截止时间
            TelemetryEvent::ReadTimedOut { .. } | TelemetryEvent::SubscribeTimedOut { .. } => {},

            TelemetryEvent::SessionReady => {
                self.ready = true;
            },

            TelemetryEvent::SessionClosed { reason } => {
                log(&format!("session closed: {reason}"));
                return false;
            },
        }
        true
    }

    /// 解析并执行一行控制台输入，返回 false 表示退出
    fn handle_line(&mut self, line: &str) -> bool {
        let words: Vec<&str> = line.trim().split_whitespace().collect();
        match words.first().copied() {
            None => {},

            Some("exit") | Some("quit") | Some("SIGINT") => {
                log("Terminating dishwasher console.");
                return false;
            },

            Some("help") => self.print_help(),

            Some("sensors") => {
                // 响应到达后按普通报告路径展示
                if let Err(err) = self.client.session().read(FieldId::AnalogData) {
                    log(&err.to_string());
                }
            },

            Some("all") => {
                if words.len() == 1 {
                    for field in FieldId::ALL {
                        self.enqueue_read(field, false);
                    }
                } else {
                    self.unrecognised_command(line, words.len());
                }
            },

            Some("set") => self.handle_set(line, &words),

            Some("raw") => {
                if words.len() == 2 {
                    match words[1].parse::<FieldId>() {
                        Ok(field) => self.enqueue_read(field, true),
                        Err(_) => self.unrecognised_field(words[1]),
                    }
                } else {
                    self.unrecognised_command(line, words.len());
                }
            },

            Some(word) => {
                if words.len() == 1 {
                    match word.parse::<FieldId>() {
                        Ok(field) => self.enqueue_read(field, false),
                        Err(_) => self.unrecognised_field(word),
                    }
                } else {
                    self.unrecognised_command(line, words.len());
                }
            },
        }
        true
    }

    fn handle_set(&mut self, line: &str, words: &[&str]) {
        if words.get(1) == Some(&"personality") {
            if words.len() == 4 {
                match (words[2].parse::<u32>(), words[3].parse::<u32>()) {
                    (Ok(personality), Ok(source)) => {
                        log(&format!(
                            "Setting \"personality\" to {{ personality={}; source={} }}",
                            describe_integer(personality),
                            describe_integer(source)
                        ));
                        let record = FieldRecord::Personality(Personality {
                            personality,
                            source: PersonalitySource::from(source),
                        });
                        match self.client.write_record(FieldId::Personality, &record) {
                            // 写后回读确认，节拍器保证与写保持间距
                            Ok(()) => self.enqueue_read(FieldId::Personality, false),
                            Err(err) => log(&err.to_string()),
                        }
                    },
                    (Err(err), _) | (_, Err(err)) => log(&err.to_string()),
                }
            } else {
                log("syntax: set personality <personality> <source>");
            }
            return;
        }

        if words.len() == 3 {
            let name = words[1];
            match name.parse::<FieldId>() {
                Ok(field) if field.is_numeric_writable() => match words[2].parse::<u32>() {
                    Ok(value) => {
                        log(&format!("Setting \"{name}\" to {value}"));
                        if let Err(err) = self.client.write_number(field, value) {
                            log(&err.to_string());
                        }
                    },
                    Err(err) => log(&err.to_string()),
                },
                _ => self.unrecognised_field(name),
            }
        } else {
            self.unrecognised_command(line, words.len());
        }
    }

    fn print_help(&self) {
        log("commands:");
        log("  <field>: read the field");
        log("  raw <field>: read the field and display raw data");
        log("  all: read all fields");
        log("  available fields are:");
        for field in FieldId::ALL {
            log(&format!("    {field}"));
        }
        for field in FieldId::NUMERIC_WRITABLE {
            log(&format!("  set {field} <n>: set this field to <n>"));
        }
        log("  set personality <personality> <source>: set personality to <personality> with <source>");
        log("");
    }

    fn unrecognised_command(&self, line: &str, words: usize) {
        log(&format!("Command not recognised: \"{line}\" ({words} words)\n"));
    }

    fn unrecognised_field(&self, field: &str) {
        log(&format!("Field not recognised: \"{field}\"\n"));
    }
}

/// 专用输入线程：拿到令牌才显示提示符
fn spawn_input(prompt_rx: Receiver<()>, command_tx: Sender<String>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut rl = match Editor::<(), DefaultHistory>::new() {
            Ok(rl) => rl,
            Err(err) => {
                eprintln!("failed to initialize readline: {err}");
                return;
            },
        };
        let history_path = ".washlink_history";
        rl.load_history(history_path).ok();

        while prompt_rx.recv().is_ok() {
            match rl.readline("dishwasher> ") {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    if line == "exit" || line == "quit" {
                        rl.save_history(history_path).ok();
                        let _ = command_tx.send(line);
                        break;
                    }
                    if command_tx.send(line).is_err() {
                        break;
                    }
                },

                // Ctrl+C：交给主线程收尾
                Err(ReadlineError::Interrupted) => {
                    let _ = command_tx.send("SIGINT".to_string());
                    break;
                },

                // Ctrl+D：静默退出
                Err(ReadlineError::Eof) => {
                    rl.save_history(history_path).ok();
                    break;
                },

                Err(err) => {
                    eprintln!("readline error: {err:?}");
                    break;
                },
            }
        }
    })
}

/// 运行控制台
pub fn run_repl(config: SessionConfig) -> Result<()> {
    let (bus, _sim) = SimulatedDishwasher::spawn(SimulatorProfile::default());
    let request_timeout = Duration::from_millis(config.request_timeout_ms);

    tracing::debug!(
        timeout_ms = request_timeout.as_millis() as u64,
        "starting console session"
    );
    let session = SessionBuilder::new().config(config).start(bus)?;
    let client = SessionClient::new(session);
    let events = client.subscribe()?;

    let (prompt_tx, prompt_rx) = bounded::<()>(1);
    let (command_tx, command_rx) = bounded::<String>(10);
    let input = spawn_input(prompt_rx, command_tx);

    let mut console = Console {
        client,
        pending: Vec::new(),
        ready: false,
        request_timeout,
        prompt_tx,
    };

    loop {
        select! {
            recv(command_rx) -> msg => {
                let Ok(line) = msg else {
                    // 输入线程退出（Ctrl+D 或读取错误）
                    log("Terminating dishwasher console.");
                    break;
                };
                if !console.handle_line(&line) {
                    break;
                }
            },

            recv(events) -> msg => {
                let Ok(event) = msg else {
                    log("Terminating dishwasher console.");
                    break;
                };
                if !console.handle_event(event) {
                    break;
                }
            },

            default(TICK) => {
                console.sweep_deadlines();
            },
        }
        console.maybe_prompt();
    }

    // 输入线程可能正停在提示符上，不等它：进程退出时一并回收
    drop(console);
    drop(input);
    Ok(())
}
