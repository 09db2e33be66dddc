use std::cell::RefCell;
use std::rc::Rc;

use synapse::{Mode, SignalId, Simulation, SimResult, SimulationConfig, Timer, VirtualTime};
use tracing_subscriber::EnvFilter;

/// Link latency in ticks, each direction.
const LATENCY: u64 = 2;
/// Retransmission timeout.
const RTO: u64 = 7;

/// Stop-and-wait sender: one packet in flight, retransmit on timeout.
struct Sender {
    data: SignalId<u32>,
    next_seq: u32,
    last_seq: u32,
    retransmissions: u32,
    rto: Option<Timer>,
}

impl Sender {
    fn transmit(&mut self, sim: &mut Simulation) -> SimResult<()> {
        sim.emit(self.data, self.next_seq, LATENCY)?;
        if let Some(rto) = &self.rto {
            rto.set(sim, RTO)?;
        }
        Ok(())
    }

    fn on_ack(&mut self, sim: &mut Simulation, seq: u32) {
        if seq != self.next_seq {
            return;
        }
        println!("    {}  sender: ack #{}", sim.now(), seq);
        let step = if seq == self.last_seq {
            match &self.rto {
                Some(rto) => rto.reset(sim),
                None => Ok(()),
            }
        } else {
            self.next_seq += 1;
            self.transmit(sim)
        };
        if let Err(e) = step {
            eprintln!("sender: {}", e);
        }
    }

    fn on_timeout(&mut self, sim: &mut Simulation, at: VirtualTime) {
        println!("    {}  sender: timeout (expired {}), resending #{}", sim.now(), at, self.next_seq);
        self.retransmissions += 1;
        if let Err(e) = self.transmit(sim) {
            eprintln!("sender: {}", e);
        }
    }
}

/// Receiver that loses every third arrival and acks the rest.
struct Receiver {
    ack: SignalId<u32>,
    arrivals: u32,
}

impl Receiver {
    fn on_data(&mut self, sim: &mut Simulation, seq: u32) {
        self.arrivals += 1;
        if self.arrivals % 3 == 0 {
            println!("    {}  receiver: lost #{}", sim.now(), seq);
            return;
        }
        println!("    {}  receiver: got #{}", sim.now(), seq);
        if let Err(e) = sim.emit(self.ack, seq, LATENCY) {
            eprintln!("receiver: {}", e);
        }
    }
}

fn main() -> SimResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("═══════════════════════════════════════════════════════");
    println!("  Synapse — signal/slot stop-and-wait demo");
    println!("═══════════════════════════════════════════════════════");
    println!();

    let debug = std::env::var_os("SYNAPSE_DEBUG").is_some();
    let config = if debug {
        SimulationConfig::verbose()
    } else {
        SimulationConfig::new()
    };
    let mut sim = Simulation::with_config(config);

    let data = sim.signal::<u32>("data", Mode::Continuous);
    let ack = sim.signal::<u32>("ack", Mode::Continuous);
    let data_in = sim.slot::<u32>("receiver.data");
    let ack_in = sim.slot::<u32>("sender.ack");

    let sender = Rc::new(RefCell::new(Sender {
        data,
        next_seq: 1,
        last_seq: 5,
        retransmissions: 0,
        rto: None,
    }));
    let receiver = Rc::new(RefCell::new(Receiver { ack, arrivals: 0 }));

    let rto = Timer::new(&mut sim, "sender.rto", &sender, Sender::on_timeout);
    sender.borrow_mut().rto = Some(rto);

    sim.bind(data_in, &receiver, Receiver::on_data)?;
    sim.bind(ack_in, &sender, Sender::on_ack)?;
    sim.connect(data, data_in)?;
    sim.connect(ack, ack_in)?;

    sender.borrow_mut().transmit(&mut sim)?;
    let processed = sim.run();

    let s = sender.borrow();
    println!();
    println!("  Deliveries dispatched: {}", processed);
    println!("  Retransmissions:       {}", s.retransmissions);
    println!("  Finished at:           {}", sim.now());
    if debug {
        println!("  Traced deliveries:     {}", sim.trace.len());
    }
    Ok(())
}
