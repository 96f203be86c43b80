//! LogSink port - 整形済みの request / response ログを受け取る
//!
//! descriptor の log フラグが立っているときだけ呼ばれます。

pub trait LogSink: Send + Sync {
    fn log(&self, content: &str);
}
