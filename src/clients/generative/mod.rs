mod client;
mod models;

pub use client::ModelGatewayClient;
pub use models::{GenerateRequest, ImagePayload, ResponseFormat};

use anyhow::Result;
use async_trait::async_trait;

/// 生成サービス境界。
///
/// 「プロンプト + 任意の画像を渡してテキストを受け取る」単一の論理能力。
/// 写真判定・メニュー抽出・ランキング・ガード検証のすべてがこの境界を通る。
/// 実装が利用不能な場合でもパイプラインは決定的フォールバックで継続する。
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// プロンプトを送信し、生成テキストを受け取る。
    ///
    /// # Errors
    /// 転送失敗、タイムアウト、エラーステータスの場合はエラーを返す。
    async fn generate(&self, request: GenerateRequest) -> Result<String>;

    /// サービスの死活確認。
    ///
    /// # Errors
    /// サービスに到達できない場合はエラーを返す。
    async fn health_check(&self) -> Result<()>;
}
