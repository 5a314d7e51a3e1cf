#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::{info, unwrap, warn};
use defmt_rtt as _;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::adc::{Adc, Channel as AdcChannel, Config as AdcConfig};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::peripherals::UART1;
use embassy_rp::pwm::{Config as PwmConfig, Pwm, PwmOutput};
use embassy_rp::uart::{Async, Config as UartConfig, Uart, UartRx, UartTx};
use embassy_rp::{bind_interrupts, Peri};
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Delay, Duration, Instant, Ticker, Timer};
use lhr_core::{
    BoardProtocol, Controller, CoreProtocol, HBridgeMotor, HandshakeConfig, LinearActuatorAxis,
    Pid, PidActuator, ResponsiveSmoother, Version,
};
use lhr_firmware::{
    axes, AdcSensor, AnalogInputs, AxisTuning, HostTransport, PicoBoard, PipeStream, RxPipe,
    SharedAnalog, TxPipe,
};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    UART1_IRQ => embassy_rp::uart::InterruptHandler<UART1>;
});

/// Control loop period.
const TICK: Duration = Duration::from_millis(1);

/// PWM counter wrap for a ~20 kHz bridge frequency at 125 MHz.
const PWM_TOP: u16 = 6249;

/// Bytes received from the host, drained by the control loop.
static RX_PIPE: RxPipe = RxPipe::new();
/// Bytes for the host, drained by the UART transmit task.
static TX_PIPE: TxPipe = TxPipe::new();

/// ADC shared by the axis sensors and the board protocol.
static ANALOG: StaticCell<SharedAnalog> = StaticCell::new();

/// Executor for the UART pumps, preempting the control loop.
static EXECUTOR_UART: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_0() {
    EXECUTOR_UART.on_interrupt()
}

type BridgeMotor = HBridgeMotor<PwmOutput<'static>, PwmOutput<'static>>;
type Axis = LinearActuatorAxis<PidActuator<BridgeMotor, AdcSensor>, ResponsiveSmoother>;

fn bridge_motor<S: embassy_rp::pwm::Slice>(
    slice: Peri<'static, S>,
    in1: Peri<'static, impl embassy_rp::pwm::ChannelAPin<S>>,
    in2: Peri<'static, impl embassy_rp::pwm::ChannelBPin<S>>,
) -> BridgeMotor {
    let mut config = PwmConfig::default();
    config.top = PWM_TOP;
    let pwm = Pwm::new_output_ab(slice, in1, in2, config);
    let (a, b) = pwm.split();
    HBridgeMotor::new(unwrap!(a), unwrap!(b))
}

fn axis(tuning: &AxisTuning, motor: BridgeMotor, analog: &'static SharedAnalog) -> Axis {
    let sensor = AdcSensor::new(analog, tuning.adc_channel, tuning.invert_sensor);
    let actuator = PidActuator::new(motor, sensor, Pid::new(tuning.config.pid));
    let smoother = ResponsiveSmoother::new(tuning.config.smoother);
    LinearActuatorAxis::new(&tuning.config, actuator, smoother)
}

fn now() -> lhr_core::Instant {
    // Wraps after ~49 days; all interval math is wrapping.
    lhr_core::Instant::from_millis(Instant::now().as_millis() as u32)
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("liquid-handling robot starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // --- UART Setup ---
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = 115_200;

    let uart = Uart::new(
        p.UART1,
        p.PIN_8, // TX
        p.PIN_9, // RX
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    let (tx, rx) = uart.split();

    interrupt::SWI_IRQ_0.set_priority(Priority::P2);
    let uart_spawner = EXECUTOR_UART.start(interrupt::SWI_IRQ_0);
    uart_spawner.spawn(unwrap!(uart_rx_task(rx, &RX_PIPE)));
    uart_spawner.spawn(unwrap!(uart_tx_task(tx, &TX_PIPE)));

    // --- Analog Setup ---
    let adc = Adc::new_blocking(p.ADC, AdcConfig::default());
    let channels = [
        AdcChannel::new_pin(p.PIN_26, Pull::None),
        AdcChannel::new_pin(p.PIN_27, Pull::None),
        AdcChannel::new_pin(p.PIN_28, Pull::None),
        // Only broken out on boards without the Pico's VSYS divider.
        AdcChannel::new_pin(p.PIN_29, Pull::None),
    ];
    let analog: &'static SharedAnalog =
        ANALOG.init(Mutex::new(RefCell::new(AnalogInputs::new(adc, channels))));

    // --- Board Setup ---
    let digital = [
        Input::new(p.PIN_12, Pull::Down),
        Input::new(p.PIN_13, Pull::Down),
        Input::new(p.PIN_14, Pull::Down),
        Input::new(p.PIN_15, Pull::Down),
        Input::new(p.PIN_16, Pull::Down),
        Input::new(p.PIN_17, Pull::Down),
        Input::new(p.PIN_18, Pull::Down),
        Input::new(p.PIN_19, Pull::Down),
        Input::new(p.PIN_20, Pull::Down),
        Input::new(p.PIN_21, Pull::Down),
        Input::new(p.PIN_22, Pull::Down),
    ];
    let led = Output::new(p.PIN_25, Level::Low);

    let mut core = CoreProtocol::new(Version::PROTOCOL);
    let mut board = BoardProtocol::new(PicoBoard::new(analog, digital, led));

    // --- Axes ---
    let mut pipettor = axis(
        &axes::PIPETTOR,
        bridge_motor(p.PWM_SLICE1, p.PIN_2, p.PIN_3),
        analog,
    );
    let mut z_axis = axis(
        &axes::Z_AXIS,
        bridge_motor(p.PWM_SLICE2, p.PIN_4, p.PIN_5),
        analog,
    );
    let mut y_axis = axis(
        &axes::Y_AXIS,
        bridge_motor(p.PWM_SLICE3, p.PIN_6, p.PIN_7),
        analog,
    );
    let mut x_axis = axis(
        &axes::X_AXIS,
        bridge_motor(p.PWM_SLICE5, p.PIN_10, p.PIN_11),
        analog,
    );

    // --- Host Link ---
    let stream = PipeStream::new(&RX_PIPE, &TX_PIPE);
    let mut controller = Controller::new(HostTransport::new(stream));

    info!("waiting for host handshake...");
    controller.connect(&mut Delay, &HandshakeConfig::DEFAULT);
    core.send_version(controller.messager_mut());
    info!("host connected");

    let mut ticker = Ticker::every(TICK);

    // Park the pipettor carriage at the top before anything else moves.
    z_axis.start_homing(controller.messager_mut(), axes::Z_HOMING_DUTY, now());
    while z_axis.homing() {
        controller.tick(now(), &mut [&mut core, &mut board, &mut pipettor, &mut z_axis]);
        if core.reset_requested() {
            break;
        }
        ticker.next().await;
    }

    info!("entering control loop");
    loop {
        controller.tick(
            now(),
            &mut [
                &mut core,
                &mut board,
                &mut pipettor,
                &mut z_axis,
                &mut y_axis,
                &mut x_axis,
            ],
        );

        if core.reset_requested() {
            // Let the acknowledgement reach the host first.
            while controller.messager().transport().inner().pending_output() > 0 {
                embassy_futures::yield_now().await;
            }
            Timer::after_millis(5).await;
            warn!("resetting");
            cortex_m::peripheral::SCB::sys_reset();
        }

        ticker.next().await;
    }
}

/// UART receive task - moves host bytes into the receive pipe.
#[embassy_executor::task]
async fn uart_rx_task(mut rx: UartRx<'static, Async>, pipe: &'static RxPipe) {
    let mut byte = [0u8; 1];
    loop {
        match rx.read(&mut byte).await {
            Ok(()) => pipe.write_all(&byte).await,
            Err(e) => warn!("UART receive error: {:?}", e),
        }
    }
}

/// UART transmit task - sends everything written to the transmit pipe.
#[embassy_executor::task]
async fn uart_tx_task(mut tx: UartTx<'static, Async>, pipe: &'static TxPipe) {
    let mut buf = [0u8; 64];
    loop {
        let n = pipe.read(&mut buf).await;
        if let Err(e) = tx.write(&buf[..n]).await {
            warn!("UART transmit error: {:?}", e);
        }
    }
}
