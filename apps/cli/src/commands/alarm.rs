//! 报警解码命令（离线）

use anyhow::{Result, bail};
use clap::Args;
use nova_client::ControllerConfig;
use nova_tools::AlarmDecoder;

/// 解码 `GetErrorID()` 应答或直接查询报警 ID
#[derive(Args, Debug)]
pub struct AlarmCommand {
    /// 应答文本，例如 "0,{16,0},GetErrorID()"
    #[arg(conflicts_with_all = ["controller", "servo"])]
    pub status: Option<String>,

    /// 控制器报警 ID
    #[arg(long)]
    pub controller: Option<u32>,

    /// 伺服报警 ID
    #[arg(long)]
    pub servo: Option<u32>,

    /// 语言（默认取配置）
    #[arg(long)]
    pub lang: Option<String>,
}

impl AlarmCommand {
    pub fn execute(&self, config: &ControllerConfig) -> Result<()> {
        let decoder = AlarmDecoder::load(config.catalog_paths().as_ref());
        let lang = self.lang.as_deref().unwrap_or(&config.language);

        let (controller_id, servo_id) = match &self.status {
            Some(text) => match AlarmDecoder::parse_status(text) {
                Some(event) => (event.controller_id, event.servo_id),
                None => bail!("unable to parse error id from {:?}", text),
            },
            None => (self.controller.unwrap_or(0), self.servo.unwrap_or(0)),
        };

        println!("{}", decoder.compose_message(controller_id, servo_id, lang));
        Ok(())
    }
}
