use tdx2_rust::protocol::frame;
use tdx2_rust::protocol::*;

fn init_logger() {
    // TDX2_DEBUG 非空时默认 debug，RUST_LOG 优先
    let level = match std::env::var("TDX2_DEBUG") {
        Ok(v) if !v.is_empty() => "debug",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn print_frame<M: Message>(req: &M::Request) {
    let def = M::definition(req);
    let payload = match M::encode(req) {
        Ok(payload) => payload,
        Err(e) => {
            log::error!("{} 编码失败: {}", def.name, e);
            return;
        }
    };
    match frame::encode(&def, &payload) {
        Ok(bytes) => println!("{} (0x{:04X}) 请求帧: {:02X?}", def.name, def.opcode, bytes),
        Err(e) => log::error!("{} 组帧失败: {}", def.name, e),
    }
}

fn main() {
    init_logger();
    println!("TDX2 Rust - 通达信协议 Rust 实现");

    print_frame::<Connect>(&());
    print_frame::<SecurityCount>(&SecurityCountRequest {
        market: Market::SH,
        date: chrono::Local::now().date_naive(),
    });

    let (market, code) = match parse_symbol("sh000001") {
        Ok(symbol) => symbol,
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };
    print_frame::<Kline>(&KlineRequest {
        market,
        code,
        period: Period::Day,
        start: 0,
        count: 800,
        variant: KlineVariant::Standard,
    });
    print_frame::<FuturesList>(&FuturesListRequest {
        start: 0,
        variant: FuturesListVariant::Primary,
    });
}
