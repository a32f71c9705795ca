use std::future::{ready, Ready};
use std::io::Write;
use std::time::Instant;

use actix_web::{
   dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
   Error,
};
use colored::Colorize;
use env_logger::{Builder, Env};
use futures_util::future::LocalBoxFuture;
use log::{info, Level};

/// Logs every request line and the status it was answered with.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
   S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
   S::Future: 'static,
   B: 'static,
{
   type Response = ServiceResponse<B>;
   type Error = Error;
   type InitError = ();
   type Transform = LoggerMiddlewareService<S>;
   type Future = Ready<Result<Self::Transform, Self::InitError>>;

   fn new_transform(&self, service: S) -> Self::Future {
      ready(Ok(LoggerMiddlewareService { service }))
   }
}

pub struct LoggerMiddlewareService<S> {
   service: S
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
   type Response = ServiceResponse<B>;
   type Error = Error;
   type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

   forward_ready!(service);

   fn call(&self, req: ServiceRequest) -> Self::Future {
      let started = Instant::now();
      let line = format!("{} {}", req.method(), req.uri());
      info!("--> {}", line);
      let fut = self.service.call(req);

      Box::pin(async move {
         let res = fut.await?;
         info!("<-- {} {} in {:?}", line, res.status().as_u16(), started.elapsed());
         Ok(res)
      })
   }
}

fn paint(level: Level) -> colored::ColoredString {
   let name = format!("{:<5}", level);
   match level {
      Level::Error => name.red().bold(),
      Level::Warn => name.yellow().bold(),
      Level::Info => name.green(),
      Level::Debug => name.blue(),
      Level::Trace => name.magenta(),
   }
}

/// Level comes from `RUST_LOG`, `info` when unset.
pub fn init_logger() {
   Builder::from_env(Env::default().default_filter_or("info"))
   .format(|buf, record| {
      writeln!(
         buf,
         "{} {} [{}] {}",
         chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
         paint(record.level()),
         record.target(),
         record.args()
      )
   })
   .init()
}
