use anyhow::Context;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::{info, warn};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use blezone::scanner::{BleScanner, ReplaySource, SampleSource};
use blezone::{CycleController, CycleSink, JsonLinesSink, LogSink, PositioningConfig};

/// 蓝牙信标室内房间定位
#[derive(Parser, Debug)]
#[command(name = "blezone", version, about = "BLE anchor room positioning")]
struct Cli {
    #[clap(flatten)]
    verbose: Verbosity<InfoLevel>,

    /// JSON 配置文件，缺省使用内置的四房间布局
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 回放录制的样本文件，代替蓝牙扫描
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// 运行的周期数，缺省一直运行到 Ctrl-C
    #[arg(short = 'n', long)]
    cycles: Option<u64>,

    /// 每个周期向标准输出写一行 JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// 打印 RSSI -> 距离对照表后退出
    #[arg(long, default_value_t = false)]
    print_calibration: bool,

    /// 打印生效的配置后退出
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let config = match &cli.config {
        Some(path) => PositioningConfig::load(path)
            .with_context(|| format!("加载配置 {} 失败", path.display()))?,
        None => PositioningConfig::default(),
    };

    if cli.print_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    let model = &config.calibration;
    if cli.print_calibration {
        println!("{}", model);
        for (rssi, units) in model.lookup_table(-40, -80, 5) {
            println!(
                "RSSI: {:3}dBm -> {:5.1} 单位 ({:.2}m)",
                rssi,
                units,
                model.units_to_meters(units)
            );
        }
        return Ok(());
    }

    info!("{}", model);
    info!(
        "信标 {} 个，区域 {} 个，扫描窗口 {} ms",
        config.anchors.len(),
        config.regions.len(),
        config.scan.window_ms
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("收到 Ctrl-C，停止定位");
        } else {
            warn!("无法监听 Ctrl-C");
        }
        ctrl_c.cancel();
    });

    match &cli.replay {
        Some(path) => {
            let source = ReplaySource::load(path)
                .with_context(|| format!("加载回放文件 {} 失败", path.display()))?;
            run(&cli, &config, source, &cancel).await
        }
        None => {
            let source = BleScanner::first_adapter(config.scan.name_regex()?)
                .await
                .context("初始化蓝牙扫描失败")?;
            run(&cli, &config, source, &cancel).await
        }
    }
}

async fn run<S: SampleSource>(
    cli: &Cli,
    config: &PositioningConfig,
    source: S,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let mut controller = CycleController::new(config, source)?;

    let mut sinks: Vec<Box<dyn CycleSink + Send>> =
        vec![Box::new(LogSink::new(config.calibration.unit_scale_m))];
    if cli.json {
        sinks.push(Box::new(JsonLinesSink::new(std::io::stdout())));
    }

    controller.run(cancel, &mut sinks, cli.cycles).await?;
    Ok(())
}
