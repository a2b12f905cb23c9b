//! MySensors 2.x protocol vocabularies.
//!
//! Each table maps the on-wire integer to a typed variant and back, and knows
//! the mnemonic used in the MySensors documentation (`S_TEMP`, `V_TEMP`, ...).
//! Serde stores the integer so snapshots stay compact and stable.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! protocol_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal => $label:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(into = "u8", try_from = "u8")]
        pub enum $name {
            $($variant = $code,)+
        }

        impl $name {
            pub fn from_u8(code: u8) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl From<$name> for u8 {
            fn from(v: $name) -> u8 {
                v as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = String;

            fn try_from(code: u8) -> Result<Self, Self::Error> {
                $name::from_u8(code)
                    .ok_or_else(|| format!("unknown {} code {code}", stringify!($name)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

protocol_enum! {
    /// Sub-type of a presentation message.
    SensorType {
        Door = 0 => "S_DOOR",
        Motion = 1 => "S_MOTION",
        Smoke = 2 => "S_SMOKE",
        Binary = 3 => "S_BINARY",
        Dimmer = 4 => "S_DIMMER",
        Cover = 5 => "S_COVER",
        Temp = 6 => "S_TEMP",
        Hum = 7 => "S_HUM",
        Baro = 8 => "S_BARO",
        Wind = 9 => "S_WIND",
        Rain = 10 => "S_RAIN",
        Uv = 11 => "S_UV",
        Weight = 12 => "S_WEIGHT",
        Power = 13 => "S_POWER",
        Heater = 14 => "S_HEATER",
        Distance = 15 => "S_DISTANCE",
        LightLevel = 16 => "S_LIGHT_LEVEL",
        ArduinoNode = 17 => "S_ARDUINO_NODE",
        ArduinoRepeaterNode = 18 => "S_ARDUINO_REPEATER_NODE",
        Lock = 19 => "S_LOCK",
        Ir = 20 => "S_IR",
        Water = 21 => "S_WATER",
        AirQuality = 22 => "S_AIR_QUALITY",
        Custom = 23 => "S_CUSTOM",
        Dust = 24 => "S_DUST",
        SceneController = 25 => "S_SCENE_CONTROLLER",
        RgbLight = 26 => "S_RGB_LIGHT",
        RgbwLight = 27 => "S_RGBW_LIGHT",
        ColorSensor = 28 => "S_COLOR_SENSOR",
        Hvac = 29 => "S_HVAC",
        Multimeter = 30 => "S_MULTIMETER",
        Sprinkler = 31 => "S_SPRINKLER",
        WaterLeak = 32 => "S_WATER_LEAK",
        Sound = 33 => "S_SOUND",
        Vibration = 34 => "S_VIBRATION",
        Moisture = 35 => "S_MOISTURE",
        Info = 36 => "S_INFO",
        Gas = 37 => "S_GAS",
        Gps = 38 => "S_GPS",
        WaterQuality = 39 => "S_WATER_QUALITY",
    }
}

impl SensorType {
    /// Node-level presentation types (sent with child id 255).
    pub fn is_node(self) -> bool {
        matches!(self, SensorType::ArduinoNode | SensorType::ArduinoRepeaterNode)
    }
}

protocol_enum! {
    /// Sub-type of set and request messages.
    ValueType {
        Temp = 0 => "V_TEMP",
        Hum = 1 => "V_HUM",
        Status = 2 => "V_STATUS",
        Percentage = 3 => "V_PERCENTAGE",
        Pressure = 4 => "V_PRESSURE",
        Forecast = 5 => "V_FORECAST",
        Rain = 6 => "V_RAIN",
        RainRate = 7 => "V_RAINRATE",
        Wind = 8 => "V_WIND",
        Gust = 9 => "V_GUST",
        Direction = 10 => "V_DIRECTION",
        Uv = 11 => "V_UV",
        Weight = 12 => "V_WEIGHT",
        Distance = 13 => "V_DISTANCE",
        Impedance = 14 => "V_IMPEDANCE",
        Armed = 15 => "V_ARMED",
        Tripped = 16 => "V_TRIPPED",
        Watt = 17 => "V_WATT",
        Kwh = 18 => "V_KWH",
        SceneOn = 19 => "V_SCENE_ON",
        SceneOff = 20 => "V_SCENE_OFF",
        HvacFlowState = 21 => "V_HVAC_FLOW_STATE",
        HvacSpeed = 22 => "V_HVAC_SPEED",
        LightLevel = 23 => "V_LIGHT_LEVEL",
        Var1 = 24 => "V_VAR1",
        Var2 = 25 => "V_VAR2",
        Var3 = 26 => "V_VAR3",
        Var4 = 27 => "V_VAR4",
        Var5 = 28 => "V_VAR5",
        Up = 29 => "V_UP",
        Down = 30 => "V_DOWN",
        Stop = 31 => "V_STOP",
        IrSend = 32 => "V_IR_SEND",
        IrReceive = 33 => "V_IR_RECEIVE",
        Flow = 34 => "V_FLOW",
        Volume = 35 => "V_VOLUME",
        LockStatus = 36 => "V_LOCK_STATUS",
        Level = 37 => "V_LEVEL",
        Voltage = 38 => "V_VOLTAGE",
        Current = 39 => "V_CURRENT",
        Rgb = 40 => "V_RGB",
        Rgbw = 41 => "V_RGBW",
        Id = 42 => "V_ID",
        UnitPrefix = 43 => "V_UNIT_PREFIX",
        HvacSetpointCool = 44 => "V_HVAC_SETPOINT_COOL",
        HvacSetpointHeat = 45 => "V_HVAC_SETPOINT_HEAT",
        HvacFlowMode = 46 => "V_HVAC_FLOW_MODE",
        Text = 47 => "V_TEXT",
        Custom = 48 => "V_CUSTOM",
        Position = 49 => "V_POSITION",
        IrRecord = 50 => "V_IR_RECORD",
        Ph = 51 => "V_PH",
        Orp = 52 => "V_ORP",
        Ec = 53 => "V_EC",
        Var = 54 => "V_VAR",
        Va = 55 => "V_VA",
        PowerFactor = 56 => "V_POWER_FACTOR",
    }
}

protocol_enum! {
    /// Sub-type of internal messages.
    InternalType {
        BatteryLevel = 0 => "I_BATTERY_LEVEL",
        Time = 1 => "I_TIME",
        Version = 2 => "I_VERSION",
        IdRequest = 3 => "I_ID_REQUEST",
        IdResponse = 4 => "I_ID_RESPONSE",
        InclusionMode = 5 => "I_INCLUSION_MODE",
        Config = 6 => "I_CONFIG",
        FindParent = 7 => "I_FIND_PARENT",
        FindParentResponse = 8 => "I_FIND_PARENT_RESPONSE",
        LogMessage = 9 => "I_LOG_MESSAGE",
        Children = 10 => "I_CHILDREN",
        SketchName = 11 => "I_SKETCH_NAME",
        SketchVersion = 12 => "I_SKETCH_VERSION",
        Reboot = 13 => "I_REBOOT",
        GatewayReady = 14 => "I_GATEWAY_READY",
        SigningPresentation = 15 => "I_SIGNING_PRESENTATION",
        NonceRequest = 16 => "I_NONCE_REQUEST",
        NonceResponse = 17 => "I_NONCE_RESPONSE",
        HeartbeatRequest = 18 => "I_HEARTBEAT_REQUEST",
        Presentation = 19 => "I_PRESENTATION",
        DiscoverRequest = 20 => "I_DISCOVER_REQUEST",
        DiscoverResponse = 21 => "I_DISCOVER_RESPONSE",
        HeartbeatResponse = 22 => "I_HEARTBEAT_RESPONSE",
        Locked = 23 => "I_LOCKED",
        Ping = 24 => "I_PING",
        Pong = 25 => "I_PONG",
        RegistrationRequest = 26 => "I_REGISTRATION_REQUEST",
        RegistrationResponse = 27 => "I_REGISTRATION_RESPONSE",
        Debug = 28 => "I_DEBUG",
        SignalReportRequest = 29 => "I_SIGNAL_REPORT_REQUEST",
        SignalReportReverse = 30 => "I_SIGNAL_REPORT_REVERSE",
        SignalReportResponse = 31 => "I_SIGNAL_REPORT_RESPONSE",
        PreSleepNotification = 32 => "I_PRE_SLEEP_NOTIFICATION",
        PostSleepNotification = 33 => "I_POST_SLEEP_NOTIFICATION",
    }
}
