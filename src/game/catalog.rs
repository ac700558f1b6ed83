//! Static unit and card tables shared by every match

use serde::{Deserialize, Serialize};

/// Resource kinds a node can yield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Memory,
    Cpu,
}

/// Unit archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Scout,
    Tank,
    Ranged,
    Healer,
    Allocator,
    GarbageCollector,
    BasicProcess,
    InheritanceDrone,
    PolymorphWarrior,
    EncapsulationShield,
    AbstractionAgent,
    ReflectionSpy,
    CodeInjector,
    DynamicDispatcher,
    CoroutineArcher,
    PromiseKnight,
    DeadlockTrap,
    LambdaSniper,
    RecursiveBomb,
    HigherOrderCommander,
    ApiGateway,
    WebsocketScout,
    RestfulHealer,
    CacheRunner,
    Indexer,
    TransactionGuard,
    Pointer,
    Buffer,
    Assert,
    StaticCast,
    DynamicCast,
    MutexGuardian,
    SemaphoreController,
    ThreadPool,
    /// Only spawned by a thread pool
    WorkerThread,
    MemoryMiner,
    CpuHarvester,
    ResourceCloner,
    NodeDefender,
}

/// Combat stats per unit kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub max_hp: i32,
    /// Units per second
    pub speed: f32,
    pub damage: i32,
    pub attack_range: f32,
    /// Attacks per second (0 = never attacks)
    pub attack_speed: f32,
    /// Seconds to build at a standard factory
    pub production_time: f32,
}

impl UnitStats {
    const fn new(
        max_hp: i32,
        speed: f32,
        damage: i32,
        attack_range: f32,
        attack_speed: f32,
        production_time: f32,
    ) -> Self {
        Self {
            max_hp,
            speed,
            damage,
            attack_range,
            attack_speed,
            production_time,
        }
    }

    /// Milliseconds between basic attacks, `None` for units that never attack
    pub fn attack_interval_ms(&self) -> Option<u64> {
        if self.attack_speed <= 0.0 {
            return None;
        }
        Some((1000.0 / self.attack_speed) as u64)
    }
}

impl UnitKind {
    pub fn stats(self) -> UnitStats {
        use UnitKind::*;
        match self {
            Scout => UnitStats::new(30, 150.0, 5, 50.0, 1.5, 2.0),
            Tank => UnitStats::new(150, 50.0, 10, 50.0, 0.8, 5.0),
            Ranged => UnitStats::new(40, 100.0, 15, 120.0, 1.0, 3.0),
            Healer => UnitStats::new(50, 80.0, 0, 80.0, 2.0, 4.0),
            Allocator => UnitStats::new(40, 60.0, 2, 30.0, 0.5, 2.0),
            GarbageCollector => UnitStats::new(60, 70.0, 8, 60.0, 1.0, 3.0),
            BasicProcess => UnitStats::new(35, 90.0, 6, 45.0, 1.2, 2.0),
            InheritanceDrone => UnitStats::new(45, 85.0, 7, 50.0, 1.0, 3.0),
            PolymorphWarrior => UnitStats::new(80, 75.0, 12, 55.0, 1.1, 4.0),
            EncapsulationShield => UnitStats::new(100, 40.0, 3, 40.0, 0.5, 5.0),
            AbstractionAgent => UnitStats::new(35, 110.0, 4, 50.0, 0.8, 3.0),
            ReflectionSpy => UnitStats::new(25, 130.0, 1, 100.0, 0.3, 2.0),
            CodeInjector => UnitStats::new(50, 95.0, 10, 70.0, 0.7, 4.0),
            DynamicDispatcher => UnitStats::new(55, 80.0, 5, 50.0, 1.5, 3.0),
            CoroutineArcher => UnitStats::new(38, 95.0, 18, 130.0, 0.9, 4.0),
            PromiseKnight => UnitStats::new(90, 65.0, 11, 50.0, 1.0, 5.0),
            DeadlockTrap => UnitStats::new(20, 120.0, 2, 60.0, 0.5, 2.0),
            LambdaSniper => UnitStats::new(30, 70.0, 50, 150.0, 0.2, 6.0),
            RecursiveBomb => UnitStats::new(25, 100.0, 8, 40.0, 1.0, 3.0),
            HigherOrderCommander => UnitStats::new(70, 60.0, 6, 60.0, 0.8, 5.0),
            ApiGateway => UnitStats::new(65, 50.0, 4, 70.0, 0.6, 4.0),
            WebsocketScout => UnitStats::new(28, 140.0, 3, 90.0, 0.7, 2.0),
            RestfulHealer => UnitStats::new(55, 85.0, 0, 90.0, 1.8, 4.0),
            CacheRunner => UnitStats::new(20, 180.0, 4, 35.0, 1.5, 1.0),
            Indexer => UnitStats::new(42, 75.0, 5, 80.0, 0.9, 3.0),
            TransactionGuard => UnitStats::new(75, 55.0, 7, 50.0, 0.8, 4.0),
            Pointer => UnitStats::new(35, 80.0, 15, 40.0, 1.0, 3.0),
            Buffer => UnitStats::new(80, 45.0, 0, 30.0, 0.0, 4.0),
            Assert => UnitStats::new(40, 100.0, 3, 60.0, 1.2, 2.0),
            StaticCast => UnitStats::new(50, 70.0, 8, 50.0, 0.9, 3.0),
            DynamicCast => UnitStats::new(45, 85.0, 20, 55.0, 0.8, 3.0),
            MutexGuardian => UnitStats::new(60, 60.0, 5, 70.0, 0.7, 4.0),
            SemaphoreController => UnitStats::new(55, 55.0, 4, 80.0, 0.6, 4.0),
            ThreadPool => UnitStats::new(70, 30.0, 0, 0.0, 0.0, 6.0),
            WorkerThread => UnitStats::new(15, 120.0, 4, 35.0, 1.5, 0.0),
            MemoryMiner => UnitStats::new(45, 70.0, 3, 35.0, 0.8, 3.0),
            CpuHarvester => UnitStats::new(45, 70.0, 3, 35.0, 0.8, 3.0),
            ResourceCloner => UnitStats::new(40, 65.0, 2, 30.0, 0.5, 4.0),
            NodeDefender => UnitStats::new(110, 50.0, 9, 70.0, 1.0, 4.0),
        }
    }

    /// Kinds that walk to resource nodes when no enemy is left to fight
    pub fn gathers_resources(self) -> bool {
        matches!(
            self,
            UnitKind::Allocator
                | UnitKind::CacheRunner
                | UnitKind::MemoryMiner
                | UnitKind::CpuHarvester
        )
    }
}

/// Factory archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactoryKind {
    #[default]
    Standard,
    /// Slower builds, stronger units
    Compiler,
    /// Faster builds, weaker units
    Interpreter,
    /// Combines units for upgrades
    Inheritance,
}

impl FactoryKind {
    pub fn time_multiplier(self) -> f32 {
        match self {
            FactoryKind::Compiler => 1.3,
            FactoryKind::Interpreter => 0.7,
            FactoryKind::Standard | FactoryKind::Inheritance => 1.0,
        }
    }

    /// Build time in seconds for a unit with the given base production time
    pub fn build_time(self, base_production_time: f32) -> f32 {
        base_production_time * self.time_multiplier()
    }

    /// Stats of a unit as it leaves this factory
    pub fn apply(self, stats: UnitStats) -> UnitStats {
        match self {
            FactoryKind::Compiler => UnitStats {
                max_hp: (stats.max_hp as f32 * 1.15) as i32,
                damage: (stats.damage as f32 * 1.1) as i32,
                ..stats
            },
            FactoryKind::Interpreter => UnitStats {
                max_hp: (stats.max_hp as f32 * 0.85) as i32,
                speed: stats.speed * 1.15,
                ..stats
            },
            FactoryKind::Standard | FactoryKind::Inheritance => stats,
        }
    }
}

/// Playable card kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    SpawnScout,
    SpawnTank,
    SpawnRanged,
    SpawnHealer,

    BuildFactory,
    BuildCompilerFactory,
    BuildInterpreterFactory,
    BuildInheritanceFactory,

    SpawnAllocator,
    SpawnGarbageCollector,
    SpawnBasicProcess,
    SpawnInheritanceDrone,
    SpawnPolymorphWarrior,
    SpawnEncapsulationShield,
    SpawnAbstractionAgent,
    SpawnReflectionSpy,
    SpawnCodeInjector,
    SpawnDynamicDispatcher,
    SpawnCoroutineArcher,
    SpawnPromiseKnight,
    SpawnDeadlockTrap,
    SpawnLambdaSniper,
    SpawnRecursiveBomb,
    SpawnHigherOrderCommander,
    SpawnApiGateway,
    SpawnWebsocketScout,
    SpawnRestfulHealer,
    SpawnCacheRunner,
    SpawnIndexer,
    SpawnTransactionGuard,
    SpawnPointer,
    SpawnBuffer,
    SpawnAssert,
    SpawnStaticCast,
    SpawnDynamicCast,
    SpawnMutexGuardian,
    SpawnSemaphoreController,
    SpawnThreadPool,
    SpawnMemoryMiner,
    SpawnCpuHarvester,
    SpawnResourceCloner,
    SpawnNodeDefender,

    UpgradeInheritance,
}

/// Card info for the client catalog
#[derive(Debug, Clone, Serialize)]
pub struct CardDefinition {
    pub kind: CardKind,
    pub name: &'static str,
    pub description: &'static str,
    pub memory_cost: i32,
    pub cpu_cost: i32,
    pub category: &'static str,
    pub production_time: f32,
}

impl CardKind {
    pub const ALL: [CardKind; 43] = {
        use CardKind::*;
        [
            SpawnScout,
            SpawnTank,
            SpawnRanged,
            SpawnHealer,
            BuildFactory,
            BuildCompilerFactory,
            BuildInterpreterFactory,
            BuildInheritanceFactory,
            SpawnAllocator,
            SpawnGarbageCollector,
            SpawnBasicProcess,
            SpawnInheritanceDrone,
            SpawnPolymorphWarrior,
            SpawnEncapsulationShield,
            SpawnAbstractionAgent,
            SpawnReflectionSpy,
            SpawnCodeInjector,
            SpawnDynamicDispatcher,
            SpawnCoroutineArcher,
            SpawnPromiseKnight,
            SpawnDeadlockTrap,
            SpawnLambdaSniper,
            SpawnRecursiveBomb,
            SpawnHigherOrderCommander,
            SpawnApiGateway,
            SpawnWebsocketScout,
            SpawnRestfulHealer,
            SpawnCacheRunner,
            SpawnIndexer,
            SpawnTransactionGuard,
            SpawnPointer,
            SpawnBuffer,
            SpawnAssert,
            SpawnStaticCast,
            SpawnDynamicCast,
            SpawnMutexGuardian,
            SpawnSemaphoreController,
            SpawnThreadPool,
            SpawnMemoryMiner,
            SpawnCpuHarvester,
            SpawnResourceCloner,
            SpawnNodeDefender,
            UpgradeInheritance,
        ]
    };

    /// Parse a wire name such as `"spawn_tank"`; unknown names yield `None`
    pub fn parse(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.to_string())).ok()
    }

    /// The unit this card queues, if it is a spawn card
    pub fn unit_kind(self) -> Option<UnitKind> {
        use CardKind::*;
        let kind = match self {
            SpawnScout => UnitKind::Scout,
            SpawnTank => UnitKind::Tank,
            SpawnRanged => UnitKind::Ranged,
            SpawnHealer => UnitKind::Healer,
            SpawnAllocator => UnitKind::Allocator,
            SpawnGarbageCollector => UnitKind::GarbageCollector,
            SpawnBasicProcess => UnitKind::BasicProcess,
            SpawnInheritanceDrone => UnitKind::InheritanceDrone,
            SpawnPolymorphWarrior => UnitKind::PolymorphWarrior,
            SpawnEncapsulationShield => UnitKind::EncapsulationShield,
            SpawnAbstractionAgent => UnitKind::AbstractionAgent,
            SpawnReflectionSpy => UnitKind::ReflectionSpy,
            SpawnCodeInjector => UnitKind::CodeInjector,
            SpawnDynamicDispatcher => UnitKind::DynamicDispatcher,
            SpawnCoroutineArcher => UnitKind::CoroutineArcher,
            SpawnPromiseKnight => UnitKind::PromiseKnight,
            SpawnDeadlockTrap => UnitKind::DeadlockTrap,
            SpawnLambdaSniper => UnitKind::LambdaSniper,
            SpawnRecursiveBomb => UnitKind::RecursiveBomb,
            SpawnHigherOrderCommander => UnitKind::HigherOrderCommander,
            SpawnApiGateway => UnitKind::ApiGateway,
            SpawnWebsocketScout => UnitKind::WebsocketScout,
            SpawnRestfulHealer => UnitKind::RestfulHealer,
            SpawnCacheRunner => UnitKind::CacheRunner,
            SpawnIndexer => UnitKind::Indexer,
            SpawnTransactionGuard => UnitKind::TransactionGuard,
            SpawnPointer => UnitKind::Pointer,
            SpawnBuffer => UnitKind::Buffer,
            SpawnAssert => UnitKind::Assert,
            SpawnStaticCast => UnitKind::StaticCast,
            SpawnDynamicCast => UnitKind::DynamicCast,
            SpawnMutexGuardian => UnitKind::MutexGuardian,
            SpawnSemaphoreController => UnitKind::SemaphoreController,
            SpawnThreadPool => UnitKind::ThreadPool,
            SpawnMemoryMiner => UnitKind::MemoryMiner,
            SpawnCpuHarvester => UnitKind::CpuHarvester,
            SpawnResourceCloner => UnitKind::ResourceCloner,
            SpawnNodeDefender => UnitKind::NodeDefender,
            BuildFactory
            | BuildCompilerFactory
            | BuildInterpreterFactory
            | BuildInheritanceFactory
            | UpgradeInheritance => return None,
        };
        Some(kind)
    }

    /// The factory this card builds, if it is a factory card
    pub fn factory_kind(self) -> Option<FactoryKind> {
        match self {
            CardKind::BuildFactory => Some(FactoryKind::Standard),
            CardKind::BuildCompilerFactory => Some(FactoryKind::Compiler),
            CardKind::BuildInterpreterFactory => Some(FactoryKind::Interpreter),
            CardKind::BuildInheritanceFactory => Some(FactoryKind::Inheritance),
            _ => None,
        }
    }

    pub fn is_unit_card(self) -> bool {
        self.unit_kind().is_some()
    }

    pub fn is_factory_card(self) -> bool {
        self.factory_kind().is_some()
    }

    pub fn definition(self) -> CardDefinition {
        use CardKind::*;
        let (name, description, memory_cost, cpu_cost, category) = match self {
            BuildFactory => ("Factory", "Build a standard factory", 100, 0, "Factory"),
            BuildCompilerFactory => ("Compiler", "Slow but stronger units", 150, 50, "Factory"),
            BuildInterpreterFactory => ("Interpreter", "Fast but weaker units", 80, 30, "Factory"),
            BuildInheritanceFactory => {
                ("Inheritance", "Combine units for upgrades", 200, 100, "Factory")
            }
            SpawnScout => ("Scout", "Fast reconnaissance unit", 30, 20, "Basic"),
            SpawnTank => ("Tank", "Heavy armored unit", 80, 40, "Basic"),
            SpawnRanged => ("Ranged", "Long range attacker", 50, 60, "Basic"),
            SpawnHealer => ("Healer", "Heals nearby allies", 60, 50, "Basic"),
            SpawnAllocator => ("Allocator", "Captures nodes, generates memory", 40, 30, "Process"),
            SpawnGarbageCollector => ("GC", "Returns resources on kills", 50, 40, "Process"),
            SpawnBasicProcess => ("Process", "Cheap basic infantry", 35, 25, "Process"),
            SpawnInheritanceDrone => ("Inherit", "Absorbs dead ally stats", 60, 45, "OOP"),
            SpawnPolymorphWarrior => ("Polymorph", "Adapts damage to target", 85, 60, "OOP"),
            SpawnEncapsulationShield => ("Shield", "Protects nearby allies", 100, 50, "OOP"),
            SpawnAbstractionAgent => ("Abstract", "Hides allies from targeting", 45, 35, "OOP"),
            SpawnReflectionSpy => ("Spy", "Reveals enemy stats", 30, 25, "Reflection"),
            SpawnCodeInjector => ("Injector", "Damages enemy factories", 70, 55, "Reflection"),
            SpawnDynamicDispatcher => ("Dispatch", "Boosts ally attack speed", 65, 50, "Reflection"),
            SpawnCoroutineArcher => ("Coroutine", "High damage, ignores armor", 75, 65, "Async"),
            SpawnPromiseKnight => ("Promise", "AoE damage on death", 90, 70, "Async"),
            SpawnDeadlockTrap => ("Deadlock", "Freezes clustered enemies", 40, 40, "Async"),
            SpawnLambdaSniper => ("Lambda", "One-shot assassin", 100, 80, "Functional"),
            SpawnRecursiveBomb => ("Recursive", "Splits on death", 55, 50, "Functional"),
            SpawnHigherOrderCommander => ("H.O.C.", "Buffs all nearby allies", 80, 65, "Functional"),
            SpawnApiGateway => ("API", "Extends ally range", 70, 55, "Network"),
            SpawnWebsocketScout => ("WebSocket", "Reveals all enemies", 35, 30, "Network"),
            SpawnRestfulHealer => ("RESTful", "Full support healer", 70, 60, "Network"),
            SpawnCacheRunner => ("Cache", "Fastest unit", 25, 20, "Storage"),
            SpawnIndexer => ("Indexer", "Marks for bonus damage", 50, 45, "Storage"),
            SpawnTransactionGuard => ("Transaction", "Rollback on death", 75, 60, "Storage"),
            SpawnPointer => ("Pointer", "Teleport striker", 60, 50, "Memory"),
            SpawnBuffer => ("Buffer", "Absorbs ally damage", 70, 40, "Memory"),
            SpawnAssert => ("Assert", "Execute low HP enemies", 45, 35, "Safety"),
            SpawnStaticCast => ("Static Cast", "Convert buffs to debuffs", 55, 45, "Safety"),
            SpawnDynamicCast => ("Dynamic Cast", "50% 2x or 0 damage", 50, 55, "Safety"),
            SpawnMutexGuardian => ("Mutex", "Locks single enemy", 65, 55, "Concurrency"),
            SpawnSemaphoreController => ("Semaphore", "Limits attackers", 70, 60, "Concurrency"),
            SpawnThreadPool => ("Thread Pool", "Spawns workers", 90, 70, "Concurrency"),
            SpawnMemoryMiner => ("Miner", "Mines memory from owned nodes", 50, 30, "Resource"),
            SpawnCpuHarvester => ("Harvester", "Harvests cpu from owned nodes", 30, 50, "Resource"),
            SpawnResourceCloner => ("Cloner", "Doubles nearby node income", 70, 60, "Resource"),
            SpawnNodeDefender => ("Defender", "Guards captured nodes", 65, 55, "Resource"),
            UpgradeInheritance => {
                ("Upgrade", "Combine units at Inheritance Factory", 50, 50, "Special")
            }
        };

        CardDefinition {
            kind: self,
            name,
            description,
            memory_cost,
            cpu_cost,
            category,
            production_time: self
                .unit_kind()
                .map(|unit| unit.stats().production_time)
                .unwrap_or(0.0),
        }
    }

    /// Full catalog for clients
    pub fn catalog() -> Vec<CardDefinition> {
        Self::ALL.iter().map(|kind| kind.definition()).collect()
    }
}
